use vergen::{BuildBuilder, CargoBuilder};
use vergen_gix::GixBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Embed build metadata for `corpair --version` output.
    // Generates VERGEN_* env vars consumed by env!() in main.rs.
    let build = BuildBuilder::default().build_timestamp(true).build()?;
    let cargo = CargoBuilder::default().target_triple(true).build()?;
    let gix = GixBuilder::default().sha(true).build()?;

    vergen::Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .emit()?;

    vergen_gix::Emitter::default().add_instructions(&gix)?.emit()?;

    Ok(())
}
