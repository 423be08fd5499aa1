//! CLI-side configuration glue: config file resolution and flag overrides
//! on top of `nicsync_config`.

use std::path::PathBuf;

use nicsync_config::Config;
use nicsync_core::ReconcileOptions;

use crate::cli::{GlobalOpts, ReconcileArgs};
use crate::error::CliError;

/// The config file in effect: `--config` / `NICSYNC_CONFIG`, else the
/// platform location.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(nicsync_config::config_path)
}

/// Load the config in effect. An explicitly named file must exist.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    if let Some(path) = global.config.as_deref() {
        if !path.exists() {
            return Err(CliError::NotFound {
                resource_type: "config file".into(),
                identifier: path.display().to_string(),
                hint: "Create one with: nicsync config init --config <path>".into(),
            });
        }
    }
    Ok(nicsync_config::load_config(global.config.as_deref())?)
}

/// Reconcile options from the `[reconcile]` table plus command flags.
/// `--ignore` patterns extend the configured list.
pub fn reconcile_options(cfg: &Config, args: &ReconcileArgs) -> ReconcileOptions {
    let mut options = cfg.reconcile.to_options();
    options.ignored_identifiers.extend(args.ignore.iter().cloned());
    options.ignore_facts_for_provisioning |= args.protect_provisioning;
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ignore: &[&str], protect: bool) -> ReconcileArgs {
        ReconcileArgs {
            state: "host.json".into(),
            facts: "facts.json".into(),
            flat: false,
            write: false,
            ignore: ignore.iter().map(|s| (*s).to_owned()).collect(),
            protect_provisioning: protect,
        }
    }

    #[test]
    fn ignore_flags_extend_config() {
        let options = reconcile_options(&Config::default(), &args(&["virbr*"], false));
        assert!(options.ignored_identifiers.contains(&"lo".to_owned()));
        assert_eq!(options.ignored_identifiers.last().map(String::as_str), Some("virbr*"));
        assert!(!options.ignore_facts_for_provisioning);
    }

    #[test]
    fn protect_flag_or_config_enables_protection() {
        let mut cfg = Config::default();
        assert!(reconcile_options(&cfg, &args(&[], true)).ignore_facts_for_provisioning);
        cfg.reconcile.ignore_facts_for_provisioning = true;
        assert!(reconcile_options(&cfg, &args(&[], false)).ignore_facts_for_provisioning);
    }
}
