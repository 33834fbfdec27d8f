use dispatchsh::{logging, Config, Shell};

fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dispatchsh: {:#}; using defaults", e);
            Config::default()
        }
    };
    logging::init(config.log_level);
    Shell::new(config).run()
}
