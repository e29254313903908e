use crate::core::forcefield::pair::LennardJones;
use crate::core::forcefield::params::ForceFieldParams;
use crate::core::models::box_dim::BoxDim;
use crate::core::models::particles::ParticleData;
use crate::core::models::system::SystemDefinition;
use crate::core::models::topology::DihedralData;
use crate::core::neighbor::NeighborList;
use crate::engine::compute::ForceCompute;
use crate::engine::config::{BenchmarkConfig, ConfigError, SystemConfig};
use crate::engine::device::{ExecutionConfiguration, ExecutionMode};
use crate::engine::dihedral::DihedralForceCompute;
use crate::engine::error::EngineError;
use crate::engine::pair::PotentialPair;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::thermo::{ComputeThermo, TempRescaleUpdater};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument};

pub const SOLVENT_TYPE: &str = "A";
pub const CHAIN_TYPE: &str = "B";
pub const BACKBONE_TYPE: &str = "backbone";

const LATTICE_JITTER: f64 = 0.05;
const INITIAL_SPEED: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub mode: ExecutionMode,
    pub step: u64,
    pub pair_energy: f64,
    pub dihedral_energy: f64,
    pub temperature: f64,
    pub pressure: f64,
    /// Largest per-particle force deviation from the first mode at this step.
    pub deviation: f64,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeSummary {
    pub mode: ExecutionMode,
    pub pair_block_size: Option<u32>,
    pub dihedral_block_size: Option<u32>,
    pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub records: Vec<StepRecord>,
    pub summaries: Vec<ModeSummary>,
    pub max_deviation: f64,
}

/// Runs the same seeded trajectory once per execution mode and checks every later mode
/// against the first one, step by step.
#[instrument(skip_all, name = "benchmark_workflow")]
pub fn run(config: &BenchmarkConfig, reporter: &ProgressReporter) -> Result<BenchmarkReport, EngineError> {
    let forcefield = match &config.forcefield_path {
        Some(path) => Some(ForceFieldParams::load(path)?),
        None => None,
    };
    info!(
        particles = config.system.n_particles,
        chains = config.system.n_chains,
        steps = config.run.steps,
        modes = config.modes.len(),
        "Starting benchmark"
    );

    let mut reference: Vec<Vec<Vector3<f64>>> = Vec::new();
    let mut records = Vec::new();
    let mut summaries = Vec::new();
    let mut max_deviation: f64 = 0.0;

    for (run_index, &mode) in config.modes.iter().enumerate() {
        let exec = ExecutionConfiguration::new(mode, config.device_workers)?;
        let mut system = build_system(&config.system, config.run.default_r_cut + config.run.r_buff)?;
        let (mut pair, mut dihedral) = build_computes(&system, &exec, config, forcefield.as_ref())?;
        let thermo = ComputeThermo::new();
        let updater = config.run.temperature.map(TempRescaleUpdater::new);
        let mut rng = StdRng::seed_from_u64(config.system.seed.wrapping_add(1));

        reporter.report(Progress::RunStart {
            mode,
            total_steps: config.run.steps,
        });
        let mut total_ms = 0.0;

        for step in 0..config.run.steps {
            let started = Instant::now();
            pair.compute(step, &system)?;
            dihedral.compute(step, &system)?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
            total_ms += elapsed_ms;

            let forces = forces_by_tag(&system, &[&pair, &dihedral])?;
            let deviation = if run_index == 0 {
                reference.push(forces);
                0.0
            } else {
                let expected = &reference[step as usize];
                let deviation = max_relative_deviation(expected, &forces);
                if deviation > config.run.tolerance {
                    return Err(EngineError::Divergence { step, deviation });
                }
                deviation
            };
            max_deviation = max_deviation.max(deviation);

            let snapshot = thermo.compute(&system.particles, &[&pair, &dihedral])?;
            records.push(StepRecord {
                mode,
                step,
                pair_energy: pair.outputs().energy_sum()?,
                dihedral_energy: dihedral.outputs().energy_sum()?,
                temperature: snapshot.temperature,
                pressure: snapshot.pressure,
                deviation,
                elapsed_ms,
            });

            if let Some(updater) = &updater {
                updater.update(step, &mut system.particles)?;
            }
            displace(&mut system.particles, config.run.displacement, &mut rng)?;
            reporter.report(Progress::StepDone);
        }

        for (compute, block_size) in [
            (pair.name(), pair.tuned_block_size()),
            (dihedral.name(), dihedral.tuned_block_size()),
        ] {
            if let Some(block_size) = block_size {
                reporter.report(Progress::Tuned {
                    compute: compute.to_string(),
                    block_size,
                });
            }
        }
        summaries.push(ModeSummary {
            mode,
            pair_block_size: pair.tuned_block_size(),
            dihedral_block_size: dihedral.tuned_block_size(),
            total_ms,
        });
        reporter.report(Progress::RunFinish { mode });
        info!(%mode, total_ms, "Run complete");
    }

    Ok(BenchmarkReport {
        records,
        summaries,
        max_deviation,
    })
}

fn build_computes(
    system: &SystemDefinition,
    exec: &ExecutionConfiguration,
    config: &BenchmarkConfig,
    forcefield: Option<&ForceFieldParams>,
) -> Result<(PotentialPair<LennardJones>, DihedralForceCompute), EngineError> {
    let mut nlist = NeighborList::new(config.run.default_r_cut, config.run.r_buff);
    nlist.add_one_four_exclusions(&system.dihedrals);

    let mut pair = PotentialPair::new(system, Box::new(nlist), config.run.default_r_cut, exec)?;
    let mut dihedral = DihedralForceCompute::new(system, exec)?;

    let lj = LennardJones::new(1.0, 1.0);
    for (a, b) in [(SOLVENT_TYPE, SOLVENT_TYPE), (SOLVENT_TYPE, CHAIN_TYPE), (CHAIN_TYPE, CHAIN_TYPE)] {
        pair.set_params(a, b, lj)?;
    }
    dihedral.set_opls(BACKBONE_TYPE, 1.3, -0.05, 0.2, 0.0)?;

    if let Some(forcefield) = forcefield {
        pair.apply_coeffs(&forcefield.pair)?;
        dihedral.apply_coeffs(&forcefield.dihedral)?;
    }
    if let Some(shift_mode) = config.run.shift_mode {
        pair.set_shift_mode(shift_mode);
    }
    pair.configure_tuner(&config.tuner)?;
    dihedral.configure_tuner(&config.tuner)?;
    debug!(mode = %exec.mode(), shift_mode = %pair.shift_mode(), "Computes configured");
    Ok((pair, dihedral))
}

/// Builds a jittered simple-cubic fluid with crankshaft-shaped chains embedded in it.
///
/// Chain particles take the first tags and type [`CHAIN_TYPE`]; every four consecutive
/// chain members form a [`BACKBONE_TYPE`] dihedral. `list_cutoff` is checked against the
/// box so that minimum imaging stays unambiguous.
pub fn build_system(config: &SystemConfig, list_cutoff: f64) -> Result<SystemDefinition, EngineError> {
    let n = config.n_particles;
    let length = (n as f64 / config.density).cbrt();
    if list_cutoff > 0.5 * length {
        return Err(ConfigError::InvalidValue {
            name: "n_particles",
            reason: format!("box length {length:.3} is too small for a list cutoff of {list_cutoff}"),
        }
        .into());
    }

    let n_side = (n as f64).cbrt().ceil() as usize;
    let spacing = length / n_side as f64;
    let half = (n_side / 2).max(1);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut pdata = ParticleData::new(n, BoxDim::cube(length), &[SOLVENT_TYPE, CHAIN_TYPE]);
    let mut dihedrals = DihedralData::new(&[BACKBONE_TYPE]);
    let mut occupied = HashSet::new();
    let mut sites = Vec::with_capacity(n);

    for c in 0..config.n_chains {
        let layer = c / (half * half);
        let (y0, z0) = (2 * (c % half), 2 * ((c / half) % half));
        let x0 = layer * (config.chain_length + 1);
        for m in 0..config.chain_length {
            let site = ((x0 + m) % n_side, (y0 + m % 2) % n_side, (z0 + (m / 2) % 2) % n_side);
            if !occupied.insert(site) {
                return Err(ConfigError::InvalidValue {
                    name: "n_chains",
                    reason: format!("{} chains of {} overlap on a {n_side}^3 lattice", config.n_chains, config.chain_length),
                }
                .into());
            }
            sites.push(site);
            let tag = (c * config.chain_length + m) as u32;
            if m >= 3 {
                dihedrals.add([tag - 3, tag - 2, tag - 1, tag], 0)?;
            }
        }
    }
    let free = (0..n_side.pow(3))
        .map(|k| (k % n_side, (k / n_side) % n_side, k / (n_side * n_side)))
        .filter(|site| !occupied.contains(site));
    sites.extend(free.take(n - sites.len()));

    let chain_particles = config.n_chains * config.chain_length;
    for (tag, &(ix, iy, iz)) in sites.iter().enumerate() {
        let tag = tag as u32;
        let mut jitter = || rng.gen_range(-LATTICE_JITTER..LATTICE_JITTER) * spacing;
        let r = Point3::new(
            (ix as f64 + 0.5) * spacing + jitter(),
            (iy as f64 + 0.5) * spacing + jitter(),
            (iz as f64 + 0.5) * spacing + jitter(),
        );
        pdata.set_position(tag, r)?;
        let v = Vector3::new(
            rng.gen_range(-INITIAL_SPEED..INITIAL_SPEED),
            rng.gen_range(-INITIAL_SPEED..INITIAL_SPEED),
            rng.gen_range(-INITIAL_SPEED..INITIAL_SPEED),
        );
        pdata.set_velocity(tag, v)?;
        if (tag as usize) < chain_particles {
            pdata.set_type(tag, 1)?;
        }
    }
    debug!(length, spacing, dihedrals = dihedrals.len(), "Benchmark system built");
    Ok(SystemDefinition::new(pdata).with_dihedrals(dihedrals))
}

fn forces_by_tag(
    system: &SystemDefinition,
    computes: &[&dyn ForceCompute],
) -> Result<Vec<Vector3<f64>>, EngineError> {
    let particles = &system.particles;
    let mut totals = vec![Vector3::zeros(); particles.len()];
    for compute in computes {
        let forces = compute.outputs().forces()?;
        for (index, record) in forces.iter().enumerate() {
            totals[particles.tag(index) as usize] += record.force;
        }
    }
    Ok(totals)
}

fn max_relative_deviation(expected: &[Vector3<f64>], actual: &[Vector3<f64>]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(e, a)| (a - e).norm() / e.norm().max(1.0))
        .fold(0.0, f64::max)
}

fn displace(particles: &mut ParticleData, displacement: f64, rng: &mut StdRng) -> Result<(), EngineError> {
    if displacement <= 0.0 {
        return Ok(());
    }
    for tag in 0..particles.len() as u32 {
        let r = particles.position(tag)?.r;
        let d = Vector3::new(
            rng.gen_range(-displacement..displacement),
            rng.gen_range(-displacement..displacement),
            rng.gen_range(-displacement..displacement),
        );
        particles.set_position(tag, r + d)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{BenchmarkConfigBuilder, TunerConfig};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    fn small_config() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::new()
            .n_particles(216)
            .density(0.6)
            .chains(4, 6)
            .seed(11)
            .steps(6)
            .default_r_cut(2.5)
            .r_buff(0.3)
            .device_workers(2)
            .tuner(TunerConfig {
                nsamples: 1,
                block_sizes: Some(vec![32, 64]),
                ..TunerConfig::default()
            })
    }

    #[test]
    fn build_system_places_chains_and_dihedrals() {
        let config = small_config().build().unwrap();
        let system = build_system(&config.system, 2.8).unwrap();
        assert_eq!(system.particles.len(), 216);
        assert_eq!(system.dihedrals.len(), 4 * 3);
        let chain_type = system.particles.type_id(CHAIN_TYPE).unwrap();
        for tag in 0..24 {
            assert_eq!(system.particles.position(tag).unwrap().type_id, chain_type);
        }
        assert_eq!(system.particles.position(24).unwrap().type_id, 0);
    }

    #[test]
    fn build_system_is_deterministic_for_a_seed() {
        let config = small_config().build().unwrap();
        let a = build_system(&config.system, 2.8).unwrap();
        let b = build_system(&config.system, 2.8).unwrap();
        assert_eq!(
            a.particles.positions_by_tag().unwrap(),
            b.particles.positions_by_tag().unwrap()
        );
    }

    #[test]
    fn build_system_rejects_a_box_smaller_than_the_list_cutoff() {
        let config = small_config().n_particles(27).chains(0, 4).build().unwrap();
        assert!(matches!(
            build_system(&config.system, 2.8),
            Err(EngineError::Config(ConfigError::InvalidValue { name: "n_particles", .. }))
        ));
    }

    #[test]
    fn host_and_accelerated_runs_agree_step_by_step() {
        let config = small_config().build().unwrap();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let report = run(&config, &reporter).unwrap();
        drop(reporter);

        assert_eq!(report.records.len(), 12);
        assert!(report.max_deviation <= config.run.tolerance);
        for (host, accel) in report.records[..6].iter().zip(&report.records[6..]) {
            assert_eq!(host.step, accel.step);
            assert!((host.pair_energy - accel.pair_energy).abs() < 1e-6 * host.pair_energy.abs().max(1.0));
            assert!((host.dihedral_energy - accel.dihedral_energy).abs() < 1e-9);
        }
        assert_eq!(report.summaries[0].pair_block_size, None);
        assert!(report.summaries[1].pair_block_size.is_some());
        assert!(report.summaries[1].dihedral_block_size.is_some());

        let events = events.into_inner().unwrap();
        let steps = events.iter().filter(|e| matches!(e, Progress::StepDone)).count();
        assert_eq!(steps, 12);
        assert!(events.iter().any(|e| matches!(e, Progress::Tuned { .. })));
    }

    #[test]
    fn temperature_target_is_applied_each_step() {
        let config = small_config()
            .modes(vec![ExecutionMode::Cpu])
            .temperature(crate::core::variant::Variant::constant(0.8))
            .build()
            .unwrap();
        let report = run(&config, &ProgressReporter::new()).unwrap();
        for record in &report.records[1..] {
            assert!((record.temperature - 0.8).abs() < 1e-9);
        }
    }

    #[test]
    fn forcefield_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [pair]
            shift-mode = "shift"

            [[pair.coeff]]
            a = "A"
            b = "A"
            epsilon = 0.0
            sigma = 1.0

            [[pair.coeff]]
            a = "A"
            b = "B"
            epsilon = 0.0
            sigma = 1.0

            [[pair.coeff]]
            a = "B"
            b = "B"
            epsilon = 0.0
            sigma = 1.0

            [dihedral.coeff.backbone]
            k = 0.0
            d = 1
            n = 1
            "#
        )
        .unwrap();
        let config = small_config()
            .modes(vec![ExecutionMode::Cpu])
            .forcefield_path(file.path().to_path_buf())
            .build()
            .unwrap();
        let report = run(&config, &ProgressReporter::new()).unwrap();
        assert!(report.records.iter().all(|r| r.pair_energy == 0.0));
        assert!(report.records.iter().all(|r| r.dihedral_energy == 0.0));
    }

    #[test]
    fn missing_forcefield_file_is_reported() {
        let config = small_config()
            .forcefield_path("/nonexistent/forcefield.toml".into())
            .build()
            .unwrap();
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::ParamLoad(_))
        ));
    }
}
