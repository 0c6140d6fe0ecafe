//! Adapters around the tools that produce raw parser output: the external
//! replay parser, the match metadata API and replay acquisition.

pub mod download;
pub mod invoker;
pub mod metadata;

pub use download::{discover_replays, replay_path, ReplayDownloader};
pub use invoker::ParserCommand;
pub use metadata::{MatchMetadata, MetadataClient};
