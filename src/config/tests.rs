use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::*;

const TEXD_VARS: &[&str] = &[
    "TEXD_ENDPOINT",
    "TEXD_READ_TIMEOUT",
    "TEXD_ENGINE",
    "TEXD_LOOKUP_PATHS",
    "TEXD_ERROR_HANDLER",
];

fn clear_env() {
    for var in TEXD_VARS {
        // SAFETY: env-touching tests are serialized.
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn defaults_match_the_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.client.endpoint.as_str(), DEFAULT_ENDPOINT);
    assert_eq!(settings.client.open_timeout, Some(Duration::from_secs(60)));
    assert_eq!(settings.client.read_timeout, Some(Duration::from_secs(180)));
    assert_eq!(settings.client.write_timeout, Some(Duration::from_secs(60)));
    assert_eq!(settings.client.errors, ErrorFormat::Full);
    assert_eq!(settings.client.engine, None);
    assert_eq!(settings.render.checksum_cache_capacity.get(), 128);
    assert_eq!(settings.render.error_handler, ErrorPolicy::Raise);
    assert!(settings.render.lookup_paths.is_empty());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.client,
        ClientSettings::with_endpoint(settings.client.endpoint.clone())
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings {
        endpoint: Some("http://file.example/".to_string()),
        engine: Some("pdflatex".to_string()),
        ..RawSettings::default()
    };

    let overrides = Overrides {
        endpoint: Some("https://cli.example/texd/".to_string()),
        engine: Some("lualatex".to_string()),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };
    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.client.endpoint.as_str(),
        "https://cli.example/texd/"
    );
    assert_eq!(settings.client.engine, Some(TexEngine::Lualatex));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn zero_timeout_disables_it() {
    let raw = RawSettings {
        read_timeout: Some(0),
        ..RawSettings::default()
    };
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.client.read_timeout, None);
    assert_eq!(settings.client.open_timeout, Some(Duration::from_secs(60)));
}

#[test]
fn invalid_values_fail_eagerly() {
    let cases = [
        (
            RawSettings {
                endpoint: Some("ftp://tex.example/".into()),
                ..RawSettings::default()
            },
            "endpoint",
        ),
        (
            RawSettings {
                endpoint: Some("not a url".into()),
                ..RawSettings::default()
            },
            "endpoint",
        ),
        (
            RawSettings {
                errors: Some("verbose".into()),
                ..RawSettings::default()
            },
            "errors",
        ),
        (
            RawSettings {
                engine: Some("context".into()),
                ..RawSettings::default()
            },
            "engine",
        ),
        (
            RawSettings {
                checksum_cache_capacity: Some(0),
                ..RawSettings::default()
            },
            "checksum_cache_capacity",
        ),
        (
            RawSettings {
                error_handler: Some("panic".into()),
                ..RawSettings::default()
            },
            "error_handler",
        ),
        (
            RawSettings {
                log_level: Some("loud".into()),
                ..RawSettings::default()
            },
            "log_level",
        ),
    ];

    for (raw, expected_key) in cases {
        match Settings::from_raw(raw) {
            Err(LoadError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid `{expected_key}`, got {other:?}"),
        }
    }
}

#[test]
fn blank_engine_means_unset() {
    let raw = RawSettings {
        engine: Some("  ".into()),
        image: Some(String::new()),
        ..RawSettings::default()
    };
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.client.engine, None);
    assert_eq!(settings.client.image, None);
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "texd",
        "--engine",
        "xelatex",
        "render",
        "--input",
        "main.tex",
        "--attach",
        "figures/plot.pdf=plot.pdf",
        "--attach",
        "preamble.sty",
        "--reference",
        "fonts/body.otf",
        "--output",
        "out.pdf",
    ]);

    assert_eq!(args.overrides.engine.as_deref(), Some("xelatex"));
    match args.command {
        Command::Render(render) => {
            assert_eq!(render.input, PathBuf::from("main.tex"));
            assert_eq!(
                render.attach,
                vec![
                    AttachSpec {
                        path: PathBuf::from("figures/plot.pdf"),
                        name: Some("plot.pdf".into()),
                    },
                    AttachSpec {
                        path: PathBuf::from("preamble.sty"),
                        name: None,
                    },
                ]
            );
            assert_eq!(render.reference, vec![PathBuf::from("fonts/body.otf")]);
            assert_eq!(render.output, Some(PathBuf::from("out.pdf")));
        }
        Command::Status => panic!("wrong command parsed"),
    }
}

#[test]
fn attach_rejects_empty_name() {
    let result = CliArgs::try_parse_from([
        "texd", "render", "--input", "a.tex", "--attach", "x.png=",
    ]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn environment_overrides_config_file() {
    clear_env();
    let dir = TempDir::new().expect("temp dir");
    let file = dir.path().join("texd.toml");
    fs::write(
        &file,
        "endpoint = \"http://file.example:2201/\"\nread_timeout = 30\nengine = \"pdflatex\"\n",
    )
    .expect("write config");

    // SAFETY: env-touching tests are serialized.
    unsafe {
        std::env::set_var("TEXD_ENDPOINT", "http://env.example:2201/");
        std::env::set_var("TEXD_LOOKUP_PATHS", "/srv/tex,/usr/share/tex");
        std::env::set_var("TEXD_ERROR_HANDLER", "stderr");
    }

    let args = CliArgs::parse_from([
        "texd",
        "--config-file",
        file.to_str().expect("utf-8 path"),
        "status",
    ]);
    let result = load(&args);
    clear_env();
    let settings = result.expect("settings");

    assert_eq!(
        settings.client.endpoint.as_str(),
        "http://env.example:2201/"
    );
    assert_eq!(settings.client.read_timeout, Some(Duration::from_secs(30)));
    assert_eq!(settings.client.engine, Some(TexEngine::Pdflatex));
    assert_eq!(
        settings.render.lookup_paths,
        vec![PathBuf::from("/srv/tex"), PathBuf::from("/usr/share/tex")]
    );
    assert_eq!(settings.render.error_handler, ErrorPolicy::Stderr);
}

#[test]
#[serial]
fn missing_explicit_config_file_fails() {
    clear_env();
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("absent.toml");
    let args = CliArgs::parse_from([
        "texd",
        "--config-file",
        missing.to_str().expect("utf-8 path"),
        "status",
    ]);
    assert!(matches!(load(&args), Err(LoadError::Build(_))));
}
