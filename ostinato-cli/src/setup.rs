//! One-shot mod-host provisioning from the config: register bundles, then
//! instantiate the plugin chain.

use std::error::Error;

use log::info;

use ostinato_core::config::Config;
use ostinato_modhost::ModHost;

pub fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let mut host = ModHost::connect(config.mod_host_address())?;

    for bundle in config.mod_host_bundles() {
        host.bundle_add(bundle)?;
        info!(target: "setup", "registered bundle {}", bundle);
    }

    for uri in config.mod_host_plugins() {
        let instance = host.add_plugin(uri)?;
        info!(target: "setup", "loaded {} as instance {}", uri, instance);
        println!("{} -> instance {}", uri, instance);
    }

    Ok(())
}
