use hafx_core::common::{InstrumentConfig, LabelRecoveryPolicy};
use hafx_core::domain::{HafxErrorKind, SimulationState};
use hafx_core::modules::serialization::{npy, write_npz_archive};
use hafx_core::modules::{
    AttenuationTable, FlareSpectrum, HafxStack, MaterialLayer, ResolutionModel,
    SimulationContainer,
};
use hafx_core::numerics::uniform_energy_edges;
use tempfile::TempDir;

fn power_law_table(amplitude: f64, exponent: f64) -> AttenuationTable {
    let energies: Vec<f64> = vec![0.5, 1.0, 5.0, 20.0, 100.0, 500.0];
    let column = |scale: f64, power: f64| -> Vec<f64> {
        energies
            .iter()
            .map(|energy| scale * energy.powf(power))
            .collect()
    };
    AttenuationTable::new(
        energies.clone(),
        column(amplitude, exponent),
        column(0.3, -1.5),
        column(0.15, -0.1),
    )
    .expect("table should build")
}

fn hafx_stack() -> HafxStack {
    let aluminum =
        MaterialLayer::new("Al", 2.7, 0.0, power_law_table(2.0e3, -2.8)).expect("absorber");
    let crystal =
        MaterialLayer::new("CeBr3", 5.1, 0.5, power_law_table(8.0e3, -2.6)).expect("crystal");
    HafxStack::new(vec![aluminum], crystal, ResolutionModel::fixed_default())
        .expect("stack should build")
}

fn flare(goes_class: Option<&str>) -> FlareSpectrum {
    let edges = uniform_energy_edges(1.0, 120.0, 1.0).expect("edges");
    let midpoints: Vec<f64> = edges.windows(2).map(|pair| 0.5 * (pair[0] + pair[1])).collect();
    let thermal = midpoints
        .iter()
        .map(|energy| 1.0e4 * (-energy / 1.5).exp())
        .collect();
    let nonthermal = midpoints.iter().map(|energy| 50.0 * energy.powf(-3.0)).collect();
    FlareSpectrum::new(goes_class.map(str::to_string), edges, thermal, nonthermal)
        .expect("spectrum should build")
}

fn simulated_container(goes_class: Option<&str>) -> SimulationContainer {
    let mut container =
        SimulationContainer::with_configuration(InstrumentConfig::default(), 1.5e-3, flare(goes_class))
            .expect("container should configure");
    container
        .simulate(&hafx_stack())
        .expect("simulation should succeed");
    container
}

#[test]
fn saved_record_loads_back_identically() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut original = simulated_container(Some("M3"));

    let path = original
        .save(temp.path().join("records"), "sweep")
        .expect("save should succeed");
    assert_eq!(original.state(), SimulationState::Persisted);
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some("sweep_M3_1.500e-03cm_hafx.npz")
    );

    let loaded =
        SimulationContainer::load(&path, &InstrumentConfig::default()).expect("load should succeed");
    assert_eq!(loaded.state(), SimulationState::Persisted);
    assert_eq!(loaded.absorber_thickness(), Some(1.5e-3));
    assert_eq!(loaded.flare_spectrum(), original.flare_spectrum());

    let pairs = [
        (original.pure_response(), loaded.pure_response()),
        (original.dispersed_response(), loaded.dispersed_response()),
    ];
    for (expected, actual) in pairs {
        let expected = expected.expect("original matrix");
        let actual = actual.expect("loaded matrix");
        assert_eq!(actual.nrows(), expected.nrows());
        assert_eq!(actual.ncols(), expected.ncols());
        for row in 0..expected.nrows() {
            for col in 0..expected.ncols() {
                assert_eq!(actual[(row, col)], expected[(row, col)]);
            }
        }
    }
}

#[test]
fn saving_twice_into_existing_directory_is_fine() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut container = simulated_container(None);
    let first = container.save(temp.path(), "").expect("first save");
    let second = container.save(temp.path(), "").expect("second save");
    assert_eq!(first, second);
    assert!(first.ends_with("no_prefix_no_goes_1.500e-03cm_hafx.npz"));
}

#[test]
fn rate_equal_to_threshold_keeps_area() {
    let container = simulated_container(Some("X1"));
    let rate = container
        .trigger_band_count_rate()
        .expect("rate should integrate");
    assert!(rate > 1.0);

    let ungated = container.compute_effective_area(0.0).expect("ungated area");
    let at_threshold = container
        .compute_effective_area(rate)
        .expect("area at threshold");
    assert_eq!(at_threshold, ungated);
    assert!(ungated.iter().any(|value| *value > 0.0));

    let below = container
        .compute_effective_area(rate - 1.0)
        .expect("area below threshold");
    assert_eq!(below.len(), ungated.len());
    assert!(below.iter().all(|value| *value == 0.0));
}

#[test]
fn thicker_absorber_reduces_low_energy_area() {
    let stack = hafx_stack();
    let mut container = simulated_container(None);
    let thin = container.compute_effective_area(0.0).expect("thin area");

    container
        .set_absorber_thickness(0.1)
        .expect("thickness should update");
    container.simulate(&stack).expect("resimulation");
    let thick = container.compute_effective_area(0.0).expect("thick area");

    assert!(thick[0] < thin[0]);
    assert!(thick.iter().zip(&thin).all(|(thick, thin)| thick <= thin));
}

#[test]
fn state_guards_reject_out_of_order_calls() {
    let mut container = SimulationContainer::new(InstrumentConfig::default());
    container.set_flare_spectrum(flare(None));

    let error = container
        .simulate(&hafx_stack())
        .expect_err("thickness missing");
    assert_eq!(error.kind(), HafxErrorKind::MissingConfiguration);
    assert_eq!(error.exit_code(), 2);

    container.set_absorber_thickness(0.01).expect("thickness");
    let temp = TempDir::new().expect("tempdir should be created");
    let error = container
        .save(temp.path(), "early")
        .expect_err("save before simulate");
    assert_eq!(error.kind(), HafxErrorKind::NotSimulated);
    let error = container
        .compute_effective_area(100.0)
        .expect_err("area before simulate");
    assert_eq!(error.kind(), HafxErrorKind::NotSimulated);
}

fn write_legacy_record(path: &std::path::Path) {
    let energies = [1.5, 2.5, 3.5];
    let identity = (0..9)
        .map(|index| if index % 4 == 0 { 1.0 } else { 0.0 })
        .collect::<Vec<_>>();
    write_npz_archive(
        path,
        &[
            ("al_thickness", npy::encode_f64_scalar(0.02)),
            ("thermal", npy::encode_f64(&[3], &[3.0, 2.0, 1.0])),
            ("nonthermal", npy::encode_f64(&[3], &[0.0, 0.0, 0.5])),
            ("energies", npy::encode_f64(&[3], &energies)),
            ("pure_response_matrix", npy::encode_f64(&[3, 3], &identity)),
            ("dispersed_response_matrix", npy::encode_f64(&[3, 3], &identity)),
        ],
    )
    .expect("legacy record should be written");
}

#[test]
fn legacy_record_recovers_class_and_edges() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = temp.path().join("old_C7_2.000e-02cm_hafx.npz");
    write_legacy_record(&path);

    let container =
        SimulationContainer::load(&path, &InstrumentConfig::default()).expect("legacy load");
    let spectrum = container.flare_spectrum().expect("spectrum");
    assert_eq!(spectrum.goes_class(), Some("C7"));
    assert_eq!(spectrum.flare(), &[3.0, 2.0, 1.5]);
    for (edge, expected) in spectrum.energy_edges().iter().zip([1.0, 2.0, 3.0, 4.0]) {
        assert!((edge - expected).abs() <= 1.0e-12);
    }
    assert_eq!(
        container.compute_effective_area(0.0).expect("area"),
        vec![18.49; 3]
    );
}

#[test]
fn strict_policy_refuses_unlabelled_records() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = temp.path().join("old_C7_2.000e-02cm_hafx.npz");
    write_legacy_record(&path);

    let config = InstrumentConfig {
        missing_label_policy: LabelRecoveryPolicy::Fail,
        ..InstrumentConfig::default()
    };
    let error = SimulationContainer::load(&path, &config).expect_err("label is required");
    assert_eq!(error.kind(), HafxErrorKind::InvalidRecord);
    assert_eq!(error.placeholder(), "RECORD.MISSING_LABEL");
}
