//! Errors raised while loading site bundles.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to resolve a `${...}` template.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown formatter: {0}")]
    UnknownFormatter(String),

    #[error("formatter '{0}' requires a width argument")]
    MissingArgument(String),

    #[error("formatter '{formatter}' got invalid width '{argument}': {source}")]
    InvalidArgument {
        formatter: String,
        argument: String,
        #[source]
        source: ParseIntError,
    },
}

/// Failure to load one bundle. The previously published state is untouched.
#[derive(Debug, Error)]
pub enum SiteConfigError {
    #[error("cannot read site root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error formatting {context}: {source}")]
    Format {
        context: String,
        #[source]
        source: FormatError,
    },

    #[error("invalid replacement pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("literal replacement for {host} has an empty 'from'")]
    EmptyLiteral { host: String },

    #[error("invalid header override '{name}' for {host}")]
    InvalidHeader { host: String, name: String },

    #[error("unsupported upstream scheme '{scheme}' for {host}")]
    InvalidScheme { host: String, scheme: String },
}

/// Aggregated result of loading every bundle under the site root.
#[derive(Debug, Error)]
pub enum LoadAllError {
    #[error(transparent)]
    Fatal(SiteConfigError),

    #[error("{} site bundle(s) failed to load: {}", .0.len(), summarize(.0))]
    Bundles(Vec<(String, SiteConfigError)>),
}

fn summarize(failures: &[(String, SiteConfigError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("error loading site {name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
