use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml parse error in {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("invalid hardware profile in {path}: {message}")]
    Conversion { path: String, message: String },
}
