use std::fmt::Display;

#[derive(Debug)]
pub struct Version {
    name: String,
    version: String,
    meta: String,
}

impl Version {
    pub fn build() -> Self {
        let meta = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };

        Version {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            meta: meta.to_string(),
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.meta)
    }
}
