use eyre::Result;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} - {m}\n";
const CONSOLE_PATTERN: &str = "{d(%H:%M:%S)} {m}\n";

/// Log to the configured file. `console` also echoes to stdout, which the
/// terminal UI cannot use because it owns the screen.
pub fn init(config: &config::Config, console: bool) -> Result<()> {
    let level = config.level_filter()?;

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(&config.log_file)?;

    let mut builder =
        Config::builder().appender(Appender::builder().build("logfile", Box::new(logfile)));
    let mut root = Root::builder().appender("logfile");

    if console {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("stdout", Box::new(stdout)));
        root = root.appender("stdout");
    }

    let config = builder.build(root.build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
