use clap::Parser;
use live_wiki::cli::EditorArgs;
use live_wiki::client::{Editor, EditorConfig, EditorSnapshot, Status};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Lines not starting with ':' are appended to the page markdown.
  :list          list pages
  :load <id>     open a page
  :new           start a new draft
  :name <title>  rename the draft
  :clear         empty the markdown
  :show          print the markdown
  :save          create or save the page
  :delete        delete the open page
  :quit          exit";

enum Command {
    List,
    Load(u64),
    New,
    Name(String),
    Clear,
    Show,
    Save,
    Delete,
    Quit,
    Help,
    Append(String),
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Append(line.to_string()));
        };
        let (verb, arg) = rest
            .split_once(' ')
            .map(|(v, a)| (v, a.trim()))
            .unwrap_or((rest, ""));

        match verb {
            "list" => Ok(Command::List),
            "load" => arg
                .parse()
                .map(Command::Load)
                .map_err(|_| format!("Not a page id: {:?}", arg)),
            "new" => Ok(Command::New),
            "name" if !arg.is_empty() => Ok(Command::Name(arg.to_string())),
            "clear" => Ok(Command::Clear),
            "show" => Ok(Command::Show),
            "save" => Ok(Command::Save),
            "delete" => Ok(Command::Delete),
            "quit" | "q" => Ok(Command::Quit),
            "help" | "h" => Ok(Command::Help),
            _ => Err(format!("Unknown command: {}", line)),
        }
    }
}

/// Print what changed between two snapshots.
fn render_changes(before: &EditorSnapshot, after: &EditorSnapshot) {
    if after.page.html != before.page.html {
        let label = if after.page.is_draft() {
            "unsaved draft"
        } else {
            after.page.name.as_str()
        };
        println!("--- preview: {} ---\n{}---------------", label, after.page.html);
    }
    if after.concurrent_edit && !before.concurrent_edit {
        println!("!! The page has been modified by another client. Reload it before saving.");
    }
    if after.status != before.status {
        match &after.status {
            Some(Status::Success(msg)) => println!("ok: {}", msg),
            Some(Status::Error(msg)) => println!("error: {}", msg),
            None => {}
        }
    }
}

#[tokio::main]
async fn main() {
    let args = EditorArgs::parse();

    // Logs go to stderr so they don't interleave with the preview
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_wiki=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let editor = Editor::connect(EditorConfig {
        server: args.server,
        quiescence: Duration::from_millis(args.debounce_ms),
    });
    editor.start().await;

    let mut rx = editor.subscribe();
    tokio::spawn(async move {
        let mut last = rx.borrow_and_update().clone();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            render_changes(&last, &snapshot);
            last = snapshot;
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        // Failures are reported through the status line by the view task
        match command {
            Command::List => {
                let _ = editor.reload().await;
                for page in editor.snapshot().pages {
                    println!("{:>4}  {}", page.id, page.name);
                }
            }
            Command::Load(id) => {
                let _ = editor.load(id).await;
            }
            Command::New => editor.new_page(),
            Command::Name(name) => editor.rename(&name),
            Command::Clear => editor.edit_markdown(""),
            Command::Show => {
                let page = editor.snapshot().page;
                let id = page.id.map(|id| id.to_string()).unwrap_or_else(|| "draft".to_string());
                println!("[{}] {}\n{}", id, page.name, page.markdown);
            }
            Command::Save => {
                let _ = editor.save().await;
            }
            Command::Delete => {
                let _ = editor.delete().await;
            }
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Append(text) => {
                let mut markdown = editor.snapshot().page.markdown;
                markdown.push_str(&text);
                markdown.push('\n');
                editor.edit_markdown(&markdown);
            }
        }
    }
}
