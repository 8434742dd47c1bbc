use log4rs::append::console::ConsoleAppender;
use log4rs::config::runtime::ConfigBuilder;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::{LogConfiguration, ModuleLogConfiguration};

// Use an ISO 8601 timestamp format and color coded level tag
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

impl From<&ModuleLogConfiguration> for Logger {
    fn from(module_config: &ModuleLogConfiguration) -> Self {
        Logger::builder().build(module_config.module.clone(), module_config.level)
    }
}

impl LogConfiguration {
    /// Installs (or replaces) the global logger so that it conforms to this
    /// [`LogConfiguration`].
    pub(in crate::log) fn set_config(&mut self) {
        let encoder = Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN));
        let stdout = ConsoleAppender::builder().encoder(encoder).build();
        let mut config: ConfigBuilder =
            Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));

        // Module filters are installed in a stable order so rebuilding is deterministic.
        let mut module_configs: Vec<&ModuleLogConfiguration> =
            self.module_configurations.values().collect();
        module_configs.sort_by(|a, b| a.module.cmp(&b.module));
        for module_config in module_configs {
            config = config.logger(module_config.into());
        }

        // The `Root` determines the global log level
        let root = Root::builder()
            .appender("stdout")
            .build(self.global_log_level);
        let new_config = match config.build(root) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to build log configuration: {e}");
                return;
            }
        };

        match self.root_handle {
            Some(ref mut handle) => handle.set_config(new_config),
            None => match log4rs::init_config(new_config) {
                Ok(handle) => self.root_handle = Some(handle),
                Err(e) => eprintln!("failed to install logger: {e}"),
            },
        }
    }
}
