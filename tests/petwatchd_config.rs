use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use petwatch::config::PetwatchConfig;
use petwatch::{Location, Point};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PETWATCH_CONFIG",
        "PETWATCH_CAMERA_URL",
        "PETWATCH_CAMERA_USER",
        "PETWATCH_CAMERA_PASSWORD",
        "PETWATCH_BOT_TOKEN",
        "PETWATCH_CHAT_ID",
        "PETWATCH_NOTIFY",
        "PETWATCH_NOTIFY_THRESHOLD_SECS",
        "PETWATCH_MQTT_BROKER",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        unknown_label = "Elsewhere"

        [camera]
        url = "http://192.168.1.20/video/mjpg.cgi"
        user = "viewer"
        password = "from-file"
        max_boundary_attempts = 5
        read_timeout_secs = 12

        [motion]
        weight = 0.3
        threshold = 12
        area_threshold = 800

        [dwell]
        notify = true
        notify_threshold_secs = 30

        [telegram]
        bot_token = "123:abc"
        chat_id = "4242"

        [report]
        bins = 25

        [pipeline]
        queue_capacity = 8

        [[zones]]
        name = "Circular house"
        x_min = 457
        x_max = 584
        y_min = 90
        y_max = 227
        "#,
    );

    std::env::set_var("PETWATCH_CONFIG", file.path());
    std::env::set_var("PETWATCH_CAMERA_PASSWORD", "from-env");
    std::env::set_var("PETWATCH_NOTIFY_THRESHOLD_SECS", "45");
    std::env::set_var("PETWATCH_MQTT_BROKER", "broker.local:1883");

    let cfg = PetwatchConfig::load().expect("load config");
    assert_eq!(cfg.camera.url, "http://192.168.1.20/video/mjpg.cgi");
    assert_eq!(cfg.camera.user.as_deref(), Some("viewer"));
    assert_eq!(cfg.camera.password.as_deref(), Some("from-env"));
    assert_eq!(cfg.camera.max_boundary_attempts, 5);
    assert_eq!(cfg.camera.read_timeout, Duration::from_secs(12));
    assert_eq!(cfg.motion.weight, 0.3);
    assert_eq!(cfg.motion.threshold, 12);
    assert_eq!(cfg.motion.area_threshold, 800.0);
    assert_eq!(cfg.dwell.notify_threshold, Duration::from_secs(45));
    assert_eq!(
        cfg.telegram.as_ref().map(|t| t.bot_token.as_str()),
        Some("123:abc")
    );
    assert_eq!(cfg.recipient(), "4242");
    assert_eq!(
        cfg.mqtt.as_ref().map(|m| m.broker_addr.as_str()),
        Some("broker.local:1883")
    );
    assert_eq!(cfg.heatmap.bins, 25);
    assert_eq!(cfg.queue_capacity, 8);

    let zones = cfg.zone_table().expect("zone table");
    assert_eq!(
        zones.classify(Point::new(500.0, 150.0)),
        Location::Zone("Circular house".into())
    );
    let outside = zones.classify(Point::new(0.0, 0.0));
    assert_eq!(zones.label(&outside), "Elsewhere");

    clear_env();
}

#[test]
fn explicit_path_wins_over_env_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let env_file = write_config("[pipeline]\nqueue_capacity = 2\n");
    let cli_file = write_config("[pipeline]\nqueue_capacity = 16\n");
    std::env::set_var("PETWATCH_CONFIG", env_file.path());

    let cfg = PetwatchConfig::load_from(Some(cli_file.path())).expect("load config");
    assert_eq!(cfg.queue_capacity, 16);

    clear_env();
}

#[test]
fn defaults_apply_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PetwatchConfig::load().expect("load defaults");
    assert!(cfg.dwell.notify);
    assert_eq!(cfg.dwell.notify_threshold, Duration::from_secs(10));
    assert_eq!(cfg.motion.weight, 0.5);
    assert_eq!(cfg.motion.threshold, 8);
    assert_eq!(cfg.zones.len(), 5);
    assert!(cfg.telegram.is_none());
    assert!(cfg.mqtt.is_none());
}

#[test]
fn notify_flag_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PETWATCH_NOTIFY", "false");
    let cfg = PetwatchConfig::load().expect("load config");
    assert!(!cfg.dwell.notify);

    std::env::set_var("PETWATCH_NOTIFY", "sometimes");
    assert!(PetwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for bad in [
        "[motion]\nweight = 0.0\n",
        "[motion]\nweight = 1.5\n",
        "[motion]\nthreshold = 256\n",
        "[camera]\nchunk_bytes = 0\n",
        "[camera]\nread_timeout_secs = 0\n",
        "[pipeline]\nqueue_capacity = 0\n",
        "[[zones]]\nname = \"Bowl\"\nx_min = 10\nx_max = 0\ny_min = 0\ny_max = 5\n",
        "[[zones]]\nname = \"Bowl\"\nx_min = 0\nx_max = 1\ny_min = 0\ny_max = 1\n\
         [[zones]]\nname = \"Bowl\"\nx_min = 2\nx_max = 3\ny_min = 0\ny_max = 1\n",
        "[[zones]]\nname = \"Unknown\"\nx_min = 0\nx_max = 1\ny_min = 0\ny_max = 1\n",
        "[telegram]\nbot_token = \"123:abc\"\n",
    ] {
        let file = write_config(bad);
        assert!(
            PetwatchConfig::load_from(Some(file.path())).is_err(),
            "accepted invalid config:\n{}",
            bad
        );
    }

    std::env::set_var("PETWATCH_NOTIFY_THRESHOLD_SECS", "ten");
    assert!(PetwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PETWATCH_CONFIG", "/nonexistent/petwatch.toml");
    assert!(PetwatchConfig::load().is_err());

    clear_env();
}
