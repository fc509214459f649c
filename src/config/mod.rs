//! Layered configuration loading
//!
//! Configuration arrives as fragments of three kinds (secrets, paths, guild)
//! from JSON files or rows of the `config` table. Startup runs:
//! 1. Read every fragment (file or database row)
//! 2. Merge fragments per kind in precedence order
//! 3. Assemble and validate the immutable effective config

mod effective;
mod error;
mod fragment;
mod loader;
mod merge;
mod psql;
mod source;

pub use effective::{EffectiveConfig, Paths, Secrets, WebDavConfig, REQUIRED_KEYS};
pub use error::ConfigError;
pub use fragment::{
    read_json_file, ConfigFragment, FragmentKind, FragmentOrigin, FragmentProvenance,
    FragmentSelector,
};
pub use loader::{
    assemble_fragments, load_from_source, load_json, load_psql, read_psql_fragments, DsnSource,
    JsonSources, DSN_ENV,
};
pub use merge::{
    merge_fragments, merge_guilds, merge_order, shallow_merge, MergedConfig, MAIN_FRAGMENT,
};
pub use psql::{fragment_from_row, PsqlFragmentStore, CONFIG_TABLE};
pub use source::FragmentSource;
