use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-player match server")]
pub struct Args {
    /// TCP port to listen on.
    #[arg(short, long, value_name = "PORT")]
    pub port: u16,
}
