//! Process configuration: the ordered host list and definitions-table
//! location.

/// The `DATABASE_HOSTS`/`DATABASE_NAME`/`DEFINITIONS_HOST` settings a
/// process is started with. Changing `database_hosts`'s length changes
/// `colo -> host` routing and is not supported at runtime — a `Config` is
/// built once, at process start, and handed to a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct Config {
    pub database_hosts: Vec<String>,
    pub database_name: String,
    pub definitions_host_index: usize,
}

impl Config {
    pub fn new(database_hosts: Vec<String>, database_name: impl Into<String>) -> Self {
        Config {
            database_hosts,
            database_name: database_name.into(),
            definitions_host_index: 0,
        }
    }

    pub fn with_definitions_host(mut self, index: usize) -> Self {
        self.definitions_host_index = index;
        self
    }

    pub fn num_hosts(&self) -> usize {
        self.database_hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_definitions_host() {
        let cfg = Config::new(vec!["a".into(), "b".into()], "edgestore")
            .with_definitions_host(1);
        assert_eq!(cfg.definitions_host_index, 1);
        assert_eq!(cfg.num_hosts(), 2);
    }
}
