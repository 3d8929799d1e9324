use crate::engine::Step;
use crate::manifest::Manifest;

mod base;
mod interpreter;
mod packages;
mod shellenv;

/// The ordered step list for a manifest.
///
/// Order is the contract: the package stage completes before the
/// interpreter stage, which completes before the profile stage. No step is
/// retried or parallelized.
pub(crate) fn all(manifest: &Manifest) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(base::BaseCheck),
        Box::new(packages::RefreshIndex),
        Box::new(packages::InstallKeyring),
        Box::new(packages::InstallPinRule),
        Box::new(packages::InstallToolkit),
    ];

    if !manifest.packages.install.is_empty() {
        steps.push(Box::new(packages::InstallOsPackages));
    }

    steps.push(Box::new(interpreter::InstallManager));
    steps.push(Box::new(interpreter::InstallInterpreter));
    steps.push(Box::new(interpreter::CreateVenv));
    steps.push(Box::new(shellenv::AppendProfile));

    steps
}
