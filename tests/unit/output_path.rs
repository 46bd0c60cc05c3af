use std::path::PathBuf;

use meter_data_downloader::device::ChannelSelector;
use meter_data_downloader::output::OutputTemplate;

#[test]
fn test_default_template_per_channel() {
    assert_eq!(
        OutputTemplate::default_for(ChannelSelector::Aggregate).render("A8032ABE54DC"),
        PathBuf::from("A8032ABE54DC.log")
    );
    assert_eq!(
        OutputTemplate::default_for(ChannelSelector::Channel(0)).render("A8032ABE54DC"),
        PathBuf::from("A8032ABE54DC_ch0.log")
    );
}

#[test]
fn test_every_placeholder_is_replaced() {
    let template = OutputTemplate::new("data/[mac]/[mac]-history.log");
    assert!(template.has_placeholder());
    assert_eq!(
        template.render("C8F09E8A1B2C"),
        PathBuf::from("data/C8F09E8A1B2C/C8F09E8A1B2C-history.log")
    );
}

#[test]
fn test_literal_path_is_kept() {
    let template = OutputTemplate::new("/var/log/meter.log");
    assert!(!template.has_placeholder());
    assert_eq!(template.render("C8F09E8A1B2C"), PathBuf::from("/var/log/meter.log"));
    assert_eq!(template.to_string(), "/var/log/meter.log");
}
