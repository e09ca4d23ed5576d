use colgen::prelude::*;
use std::error::Error;

/// Cutting stock by column generation.
///
/// Rolls of width `W` are cut into `b_i` pieces of width `w_i`. The master chooses how often each
/// cutting pattern is used,
///
/// ```text
///   min  Σ_t x_t
///   s.t. Σ_t z_{i,t} x_t >= b_i    [π_i]
///        x_t >= 0
/// ```
///
/// starting from the patterns that cut a single piece. A pattern `z` improves the master iff its
/// reduced cost `1 - Σ_i π_i z_i` is negative, so pricing is the knapsack
/// `max Σ_i π_i z_i  s.t. Σ_i w_i z_i <= W`, or equivalently a shortest path in the arc-flow graph
/// with nodes `0..=W`.
///
/// Usage: `cargo run --example cutting_stock [instance.json] [--spprc] [--in-solver]`, where the
/// instance file holds `{"widths": [..], "demands": [..], "capacity": ..}`. With `--in-solver` the
/// pricer runs as a SCIP pricer plugin and only the LP bound is printed. Set `RUST_LOG=debug` to
/// follow the iterations.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_spprc = args.iter().any(|a| a == "--spprc");
    let in_solver = args.iter().any(|a| a == "--in-solver");
    let instance = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => CuttingStockInstance::from_reader(std::fs::File::open(path)?)?,
        None => CuttingStockInstance::new(&[20, 35, 50], &[40, 30, 20], 100)?,
    };

    let master = ScipMaster::new("cutting_stock")?;
    let mut rmp = RestrictedMaster::cutting_stock(master, &instance)?;
    let mut pricer: Box<dyn Pricer> = if use_spprc {
        Box::new(SpprcPricer::for_instance(&instance))
    } else {
        Box::new(KnapsackPricer::for_instance(&instance))
    };

    if in_solver {
        let tolerance = GenerationConfig::default().tolerance;
        rmp.price_in_solver(pricer, tolerance)?;
        rmp.solve()?;
        println!("LP objective:        {:.4}", rmp.objective()?);
        println!("Material lower bound: {:.4}", instance.material_lower_bound());
        println!(
            "{} columns priced inside the solver",
            rmp.master().priced_patterns().len()
        );
        return Ok(());
    }

    let outcome = ColumnGenerator::default().generate(&mut rmp, &mut pricer)?;
    println!(
        "{} after {} iterations, {} columns added",
        if outcome.converged { "Converged" } else { "Stopped" },
        outcome.iterations,
        outcome.columns_added
    );
    println!("LP objective:        {:.4}", outcome.objective);
    println!("Material lower bound: {:.4}", instance.material_lower_bound());

    println!("\nPatterns in use");
    let widths = instance.widths();
    for (col, value) in rmp.columns().iter().zip(rmp.solution()?) {
        if value > 1e-9 {
            println!(
                "  {:>8.3} x {} (width {})",
                value,
                col.pattern,
                col.pattern.total_width(&widths)
            );
        }
    }

    let integer = rmp.solve_integer_restriction()?;
    println!("\nInteger restriction: {integer} rolls");
    Ok(())
}
