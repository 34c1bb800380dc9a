//! CLI configuration and output tests

#[cfg(test)]
mod tests {
    use std::fs;
    use std::net::Ipv4Addr;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use tempfile::TempDir;
    use vith_lifecycle::{ContainerReport, HaltOutcome, ProvisionOutcome, UpOutcome};
    use vith_shared_types::{ContainerStatus, ProvisioningItem};

    use crate::commands::lifecycle::{describe_halt, describe_provision, describe_up};
    use crate::commands::status::{format_report, report_json};
    use crate::config::{ConfigError, VithConfig};
    use crate::context::project_dir;

    /// Write a project file into a fresh temporary directory
    fn create_test_config_file(file_name: &str, content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join(file_name);
        fs::write(&config_path, content).expect("Failed to write test file");
        (temp_dir, config_path)
    }

    const SAMPLE_YAML: &str = r#"
name: shop-dev
hostnames:
  - shop.test
  - api.shop.test
provisioning:
  - type: ansible
    playbook: provision/site.yml
    extra_vars:
      db_name: shop
    tags: [web]
  - type: shell
    script: systemctl restart nginx
network:
  attempts: 5
hosts:
  privileged: false
"#;

    #[test]
    fn test_load_yaml_config() {
        let (_temp_dir, config_path) = create_test_config_file("vith.yml", SAMPLE_YAML);
        let config = VithConfig::load(Some(&config_path)).unwrap();

        assert_eq!(config.name, "shop-dev");
        assert_eq!(config.image, "images:debian/12");
        assert_eq!(config.hostnames, vec!["shop.test", "api.shop.test"]);
        assert_eq!(config.network.attempts, 5);
        assert_eq!(config.network.bridge, "lxdbr0");
        assert!(!config.hosts.privileged);
        assert_eq!(config.hosts.path, PathBuf::from("/etc/hosts"));
        assert_eq!(config.lxc.timeout_secs, 600);

        let specs = config.provisioning.as_ref().unwrap();
        let items = ProvisioningItem::decode_all(specs).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind(), "ansible");
        assert_eq!(items[1].kind(), "shell");
    }

    #[test]
    fn test_load_toml_config() {
        let (_temp_dir, config_path) = create_test_config_file(
            "vith.toml",
            r#"
name = "blog"
image = "images:debian/11"

[network]
bridge = "br-dev"
poll_interval_secs = 2
"#,
        );
        let config = VithConfig::load(Some(&config_path)).unwrap();

        assert_eq!(config.image, "images:debian/11");
        assert!(config.provisioning.is_none());

        let settings = config.lifecycle_settings();
        assert_eq!(settings.name, "blog");
        assert_eq!(settings.network.bridge, "br-dev");
        assert_eq!(settings.network.interface, "eth0");
        assert_eq!(settings.network.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.stop_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let (_temp_dir, config_path) =
            create_test_config_file("vith.yml", "hostnames: [a.test]\n");
        let result = VithConfig::load(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_hostname_is_rejected() {
        let (_temp_dir, config_path) =
            create_test_config_file("vith.yml", "name: dev\nhostnames: [\"two words.test\"]\n");
        let result = VithConfig::load(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let (_temp_dir, config_path) =
            create_test_config_file("vith.yml", "name: dev\nnetwork:\n  attempts: 0\n");
        let result = VithConfig::load(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_project_dir() {
        assert_eq!(
            project_dir(Some(Path::new("/srv/shop/vith.yml"))),
            PathBuf::from("/srv/shop")
        );
        assert_eq!(project_dir(Some(Path::new("vith.yml"))), PathBuf::from("."));
        assert_eq!(project_dir(None), PathBuf::from("."));
    }

    #[test]
    fn test_outcome_descriptions() {
        assert_eq!(
            describe_up(
                "dev",
                &UpOutcome::Started {
                    address: Ipv4Addr::new(10, 0, 3, 15),
                    provisioned: true
                }
            ),
            "dev is up at 10.0.3.15 and provisioned"
        );
        assert_eq!(
            describe_up("dev", &UpOutcome::StartFailed(ContainerStatus::Stopped)),
            "dev failed to start (stopped)"
        );
        assert_eq!(
            describe_halt("dev", &HaltOutcome::Stopped { forced: true }),
            "dev was force-stopped"
        );
        assert_eq!(
            describe_provision(
                "dev",
                &ProvisionOutcome::Provisioned {
                    barebone: false,
                    steps: 2
                }
            ),
            "dev provisioned with 2 step(s)"
        );
    }

    #[test]
    fn test_report_rendering() {
        let report = ContainerReport {
            name: "dev".to_string(),
            status: Some(ContainerStatus::Running),
            address: Some(Ipv4Addr::new(10, 0, 3, 15)),
            provisioned: true,
            host_bindings: vec![("app.test".to_string(), "10.0.3.15".to_string())],
        };

        let text = format_report(&report);
        assert!(text.contains("Status:        running\n"));
        assert!(text.contains("Provisioned:   yes\n"));
        assert!(text.contains("app.test"));

        let value = report_json(&report);
        assert_eq!(value["exists"], true);
        assert_eq!(value["status_code"], 103);
        assert_eq!(value["hosts"][0]["address"], "10.0.3.15");
    }

    #[test]
    fn test_report_for_missing_container() {
        let report = ContainerReport {
            name: "dev".to_string(),
            status: None,
            address: None,
            provisioned: false,
            host_bindings: Vec::new(),
        };

        let text = format_report(&report);
        assert!(text.contains("not created"));
        assert_eq!(report_json(&report)["exists"], false);
    }
}
