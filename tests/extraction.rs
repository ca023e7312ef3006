// tests/extraction.rs
//
// End-to-end behaviour of the text -> metrics pipeline on page dumps.
//
use soilwatch::extract::{DataQuality, Field, FieldExtractor, SECTION_FOUND};
use soilwatch::metrics::{MetricsBuilder, MetricsRecord};
use soilwatch::recorder::Pipeline;
use soilwatch::validate::ValidationLimits;

const DASHBOARD: &str = "Soil Sensor 1
Last 24 hours
GROWING PARAMETERS
N
K
12.5 mg/L
34 mg/L
56 mg/L
P
TEMPERATURE
23.4 °C
MOISTURE
Moisture: 41.2 %
ELECTRIC CONDUCTIVITY
845 µS/cm
ACIDITY
6.8 pH
";

fn metrics(text: &str) -> MetricsRecord {
    let fields = FieldExtractor::new().unwrap().extract(text);
    MetricsBuilder::new().unwrap().build(&fields)
}

#[test]
fn full_dashboard_dump() {
    let fields = FieldExtractor::new().unwrap().extract(DASHBOARD);
    assert_eq!(fields.get(Field::GrowingParametersFound), Some(SECTION_FOUND));
    assert_eq!(fields.get(Field::Temperature), Some("23.4 °C"));
    assert_eq!(fields.get(Field::Moisture), Some("41.2 %"));
    assert_eq!(fields.get(Field::ElectricConductivity), Some("845 µS/cm"));
    assert_eq!(fields.get(Field::Acidity), Some("6.80 pH"));
    assert_eq!(fields.get(Field::Nitrogen), Some("12.5 mg/kg"));
    assert_eq!(fields.get(Field::Potassium), Some("34 mg/kg"));
    assert_eq!(fields.get(Field::Phosphorus), Some("56 mg/kg"));
    assert_eq!(fields.data_quality, DataQuality::Good);

    assert_eq!(
        metrics(DASHBOARD),
        MetricsRecord {
            temperature_c: Some(23.4),
            moisture_pct: Some(41.2),
            ec_us_cm: Some(845.0),
            acidity_ph: Some(6.8),
            nitrogen: Some(12.5),
            phosphorus: Some(56.0),
            potassium: Some(34.0),
        }
    );
}

#[test]
fn npk_positional_order_is_n_k_p() {
    let m = metrics("GROWING PARAMETERS N K 10 mg/L 20 mg/L 30 mg/L P TEMPERATURE 18 °C");
    assert_eq!(m.nitrogen, Some(10.0));
    assert_eq!(m.potassium, Some(20.0));
    assert_eq!(m.phosphorus, Some(30.0));
}

#[test]
fn celsius_token_wins_over_percent_and_mg_values() {
    for n in ["0.5", "12", "23.75", "41.0"] {
        let text = format!("Moisture 55 %\n7 mg/L\nTemperature\n{n} °C");
        let expected: f64 = n.parse().unwrap();
        assert_eq!(metrics(&text).temperature_c, Some(expected), "text: {text}");
    }
}

#[test]
fn ph_candidates_in_range_are_accepted() {
    for v in [0.5, 1.0, 7.25, 14.0] {
        assert_eq!(metrics(&format!("pH: {v}")).acidity_ph, Some(v));
    }
}

#[test]
fn ph_candidates_out_of_range_fall_through() {
    for v in [0.0, 14.5, 15.0, 99.0] {
        assert_eq!(metrics(&format!("pH: {v}")).acidity_ph, None, "pH {v}");
        assert_eq!(
            metrics(&format!("pH: {v}\nAcidity: 6.5")).acidity_ph,
            Some(6.5),
            "pH {v} then acidity label"
        );
    }
}

#[test]
fn extraction_is_idempotent() {
    assert_eq!(metrics(DASHBOARD), metrics(DASHBOARD));
    let extractor = FieldExtractor::new().unwrap();
    assert_eq!(extractor.extract(DASHBOARD), extractor.extract(DASHBOARD));
}

#[test]
fn page_without_fields_yields_no_metrics() {
    let m = metrics("Dashboard offline. Please try again later.");
    assert_eq!(m, MetricsRecord::default());
}

#[test]
fn offline_panels_are_flagged_but_readings_kept() {
    let text = "No data\nNo data\nNo data\nField not found\nTemperature: 19 °C";
    let pipeline = Pipeline::new(ValidationLimits::default()).unwrap();
    let reading = pipeline.run("Sensor 2", text);
    assert_eq!(reading.fields.data_quality, DataQuality::PoorNoData);
    assert_eq!(reading.metrics.temperature_c, Some(19.0));
}

#[test]
fn validation_flags_without_altering_metrics() {
    let pipeline = Pipeline::new(ValidationLimits::default()).unwrap();
    let reading = pipeline.run("Sensor 1", "70 °C\n120 % Moisture");
    assert!(!reading.validation.is_valid());
    assert_eq!(reading.validation.issues.len(), 2);
    assert_eq!(reading.metrics.temperature_c, Some(70.0));
    assert_eq!(reading.metrics.moisture_pct, Some(120.0));
}
