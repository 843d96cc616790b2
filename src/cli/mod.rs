//! Command line interface and install-hook orchestration.

pub mod args;

pub use args::Args;

use crate::bundle::context::{BundleContext, DistType, InstallEnv};
use crate::bundle::{closure::ClosureEngine, modules, platform, plugins};
use crate::error::Result;

/// Main entry point: gate on the install context, then fix the bundle.
pub fn run() -> Result<i32> {
    // Outside a packaging install this hook must be invisible.
    let Some(install_env) = InstallEnv::detect()? else {
        return Ok(0);
    };
    let arg_map = Args::parse_args().into_map()?;

    let dist_type = DistType::from_arg(args::required(&arg_map, "dist_type")?);
    if dist_type == DistType::System {
        // System libraries are used directly; nothing to bundle.
        log::info!("dist_type=system, skipping bundle fixup");
        return Ok(0);
    }

    let platform_name = args::required(&arg_map, "platform")?.to_string();
    let ctx = BundleContext::new(install_env, &arg_map)?;
    let platform = platform::for_name(&platform_name, &ctx)?;
    fix_bundle(&ctx, platform.as_ref(), dist_type)?;
    Ok(0)
}

/// Runs the full fixup sequence against an already-populated staging
/// prefix: seed the installed binaries, stage plugins and modules, close
/// over the dependency graph, then stage platform resources.
pub fn fix_bundle(
    ctx: &BundleContext,
    platform: &dyn platform::Platform,
    dist_type: DistType,
) -> Result<()> {
    log::info!(
        "fixing bundle at {} for {}",
        ctx.prefix.display(),
        platform.name()
    );
    plugins::write_qt_conf(ctx)?;

    let mut engine = ClosureEngine::new(ctx, platform);
    log::info!("fix installed");
    engine.fix_directory(&ctx.bin_dir, false)?;
    engine.fix_directory(&ctx.lib_dir, true)?;

    plugins::stage_aux_binaries(&mut engine, platform, ctx)?;
    plugins::stage_qt_plugins(&mut engine, platform, ctx)?;
    if dist_type == DistType::Full {
        modules::stage_gtk_modules(&mut engine, platform, ctx)?;
    }

    engine.run_to_fixpoint()?;
    log::info!("fixed {} bundle entries", engine.fixed_count());

    platform.stage_resources(ctx)
}
