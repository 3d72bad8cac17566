#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate errors are fine; panics are not
    if let Ok(cfg) = steplink_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A config that validates must also convert without panicking
            let _ = steplink_core::config::LinkCfg::from(&cfg.link);
            let _ = steplink_core::config::MixerCfg::from(&cfg.mixer);
            let _ = steplink_core::config::SimCfg::from(&cfg.simulation);
        }
    }
});
