use clap::Parser;

/// CLI arguments for the wiki server
#[derive(Parser, Debug)]
#[clap(name = "wiki-server")]
#[clap(about = "Wiki page store with a live markdown event bus", long_about = None)]
pub struct ServerArgs {
    /// Port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Capacity of the event bus topic channel
    #[clap(long, default_value = "1024")]
    pub bus_capacity: usize,
}

/// CLI arguments for the terminal editor
#[derive(Parser, Debug)]
#[clap(name = "wiki-editor")]
#[clap(about = "Terminal editor with live markdown preview", long_about = None)]
pub struct EditorArgs {
    /// Wiki server base URL
    #[clap(short, long, default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Quiet period in milliseconds before the preview is re-rendered
    #[clap(long, default_value = "300")]
    pub debounce_ms: u64,
}
