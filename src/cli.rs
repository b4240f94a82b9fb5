use crate::config::{StreamConfig, MAX_MESSAGE_SIZE};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments for the livetail server
#[derive(Parser, Debug)]
#[clap(name = "livetail")]
#[clap(about = "Streams the live contents of a file to WebSocket viewers", long_about = None)]
pub struct Args {
    /// File to watch (created if missing, never truncated at startup)
    #[clap(value_name = "FILE")]
    pub file: PathBuf,

    /// Port to listen on
    #[clap(short, long, default_value = "8000")]
    pub port: u16,

    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding index.html and static assets for the viewer page
    #[clap(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// How often to check the file for changes
    #[clap(long, value_name = "MS", default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Close a connection after this long without inbound traffic
    #[clap(long, value_name = "SECS", default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    pub pong_wait_secs: u64,

    /// Deadline for each outbound write
    #[clap(long, value_name = "SECS", default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub write_wait_secs: u64,
}

impl Args {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_file() {
        assert!(Args::try_parse_from(["livetail"]).is_err());
    }

    #[test]
    fn test_defaults_match_stream_config() {
        let args = Args::try_parse_from(["livetail", "out.log"]).unwrap();
        assert_eq!(args.file, PathBuf::from("out.log"));
        assert_eq!(args.port, 8000);

        let config = args.stream_config();
        let defaults = StreamConfig::default();
        assert_eq!(config.poll_interval, defaults.poll_interval);
        assert_eq!(config.pong_wait, defaults.pong_wait);
        assert_eq!(config.write_wait, defaults.write_wait);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Args::try_parse_from(["livetail", "out.log", "--poll-interval-ms", "0"]).is_err());
    }
}
