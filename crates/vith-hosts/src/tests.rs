//! Tests for the managed host section

#[cfg(test)]
mod tests {
    use std::fs;
    use std::net::Ipv4Addr;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::{
        HostFilePromoter, HostsError, ManagedHostSection, RenamePromoter, SudoPromoter,
        BEGIN_MARKER, END_MARKER,
    };

    const PLAIN_HOSTS: &str = "127.0.0.1\tlocalhost\n\
        127.0.1.1\tworkstation\n\
        \n\
        # The following lines are desirable for IPv6 capable hosts\n\
        ::1     ip6-localhost ip6-loopback\n";

    const MANAGED_HOSTS: &str = "127.0.0.1\tlocalhost\n\
        # BEGIN vith section\n\
        10.0.3.15 app.test\n\
        10.0.3.15 api.test\n\
        # END vith section\n\
        192.168.1.20 nas.lan\n";

    /// Write `content` as a hosts file inside a fresh temporary directory
    fn create_test_hosts_file(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let hosts_path = temp_dir.path().join("hosts");
        fs::write(&hosts_path, content).expect("Failed to write test file");
        (temp_dir, hosts_path)
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 3, last)
    }

    /// Counts promotions and fails on demand
    #[derive(Default)]
    struct CountingPromoter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl HostFilePromoter for CountingPromoter {
        async fn promote(&self, staged: &Path, target: &Path) -> crate::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HostsError::PrivilegedWrite {
                    path: target.to_path_buf(),
                    command: "sudo cp".to_string(),
                    reason: "authentication failure".to_string(),
                });
            }
            RenamePromoter.promote(staged, target).await
        }
    }

    #[test]
    fn test_parse_reads_only_managed_section() {
        let section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);

        assert!(section.has_section());
        assert_eq!(section.bindings().len(), 2);
        assert_eq!(section.get("app.test"), Some(addr(15)));
        assert_eq!(section.get("nas.lan"), None);
        assert!(!section.is_changed());
    }

    #[test]
    fn test_parse_without_section() {
        let section = ManagedHostSection::parse("/etc/hosts", PLAIN_HOSTS);

        assert!(!section.has_section());
        assert!(section.bindings().is_empty());
        assert_eq!(section.render(), PLAIN_HOSTS);
    }

    #[test]
    fn test_ensure_present_is_idempotent() {
        let mut section = ManagedHostSection::parse("/etc/hosts", PLAIN_HOSTS);

        assert!(section.ensure_present("app.test", addr(15)));
        assert!(!section.ensure_present("app.test", addr(15)));
        assert_eq!(section.bindings().len(), 1);

        let mut section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);
        assert!(!section.ensure_present("app.test", addr(15)));
        assert!(!section.is_changed());
    }

    #[test]
    fn test_ensure_present_updates_address_in_place() {
        let mut section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);

        assert!(section.ensure_present("app.test", addr(42)));
        assert!(section.is_changed());

        let names: Vec<_> = section.bindings().keys().cloned().collect();
        assert_eq!(names, vec!["app.test", "api.test"]);
        assert_eq!(section.get("app.test"), Some(addr(42)));
    }

    #[test]
    fn test_ensure_absent_on_missing_hostname_is_noop() {
        let mut section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);

        assert!(!section.ensure_absent("unknown.test"));
        assert!(!section.is_changed());

        assert!(section.ensure_absent("api.test"));
        assert!(!section.ensure_absent("api.test"));
        assert!(section.is_changed());
    }

    #[test]
    fn test_render_replaces_section_and_keeps_surroundings() {
        let mut section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);
        section.ensure_absent("api.test");
        section.ensure_present("db.test", addr(16));

        let expected = "127.0.0.1\tlocalhost\n\
            # BEGIN vith section\n\
            10.0.3.15 app.test\n\
            10.0.3.16 db.test\n\
            # END vith section\n\
            192.168.1.20 nas.lan\n";
        assert_eq!(section.render(), expected);
    }

    #[test]
    fn test_render_drops_empty_section() {
        let mut section = ManagedHostSection::parse("/etc/hosts", MANAGED_HOSTS);
        section.ensure_absent("app.test");
        section.ensure_absent("api.test");

        assert_eq!(
            section.render(),
            "127.0.0.1\tlocalhost\n192.168.1.20 nas.lan\n"
        );
    }

    #[test]
    fn test_render_appends_section_when_missing() {
        let mut section = ManagedHostSection::parse("/etc/hosts", PLAIN_HOSTS);
        section.ensure_present("app.test", addr(15));

        let rendered = section.render();
        assert!(rendered.starts_with(PLAIN_HOSTS));
        assert_eq!(
            &rendered[PLAIN_HOSTS.len()..],
            format!("{}\n10.0.3.15 app.test\n{}\n", BEGIN_MARKER, END_MARKER)
        );
    }

    #[test]
    fn test_render_appends_after_unterminated_last_line() {
        let mut section = ManagedHostSection::parse("/etc/hosts", "127.0.0.1 localhost");
        section.ensure_present("app.test", addr(15));

        assert_eq!(
            section.render(),
            "127.0.0.1 localhost\n# BEGIN vith section\n10.0.3.15 app.test\n# END vith section\n"
        );
    }

    #[test]
    fn test_unterminated_section_extends_to_end_of_file() {
        let content = "127.0.0.1 localhost\n# BEGIN vith section\n10.0.3.15 app.test\n";
        let mut section = ManagedHostSection::parse("/etc/hosts", content);
        assert_eq!(section.get("app.test"), Some(addr(15)));

        section.ensure_present("api.test", addr(16));
        assert_eq!(
            section.render(),
            "127.0.0.1 localhost\n\
             # BEGIN vith section\n\
             10.0.3.15 app.test\n\
             10.0.3.16 api.test\n\
             # END vith section\n"
        );
    }

    #[test]
    fn test_non_conforming_lines_inside_section_are_dropped() {
        let content = "# BEGIN vith section\n\
            10.0.3.15 app.test\n\
            # hand-written note\n\
            10.0.3.99 two names.test\n\
            # END vith section\n\
            # after\n";
        let section = ManagedHostSection::parse("/etc/hosts", content);

        assert_eq!(section.bindings().len(), 1);
        assert_eq!(
            section.render(),
            "# BEGIN vith section\n10.0.3.15 app.test\n# END vith section\n# after\n"
        );
    }

    #[test]
    fn test_matching_lines_keep_their_address_text() {
        let content = "# BEGIN vith section\n\
            010.000.000.005 legacy.test\n\
            10.0.0.7 app.test\n\
            # END vith section\n";
        let mut section = ManagedHostSection::parse("/etc/hosts", content);

        assert_eq!(section.bindings().len(), 2);
        assert_eq!(section.bindings()["legacy.test"], "010.000.000.005");
        assert_eq!(section.get("legacy.test"), None);

        assert!(section.ensure_present("app.test", Ipv4Addr::new(10, 0, 0, 8)));
        assert_eq!(
            section.render(),
            "# BEGIN vith section\n\
             010.000.000.005 legacy.test\n\
             10.0.0.8 app.test\n\
             # END vith section\n"
        );
    }

    #[test]
    fn test_out_of_range_octets_are_kept() {
        let content = "# BEGIN vith section\n300.1.2.3 odd.test\n# END vith section\n";
        let mut section = ManagedHostSection::parse("/etc/hosts", content);

        assert_eq!(section.bindings()["odd.test"], "300.1.2.3");
        section.ensure_present("odd.test", addr(9));
        assert_eq!(section.get("odd.test"), Some(addr(9)));
    }

    #[test]
    fn test_only_first_section_is_managed() {
        let content = "# BEGIN vith section\n\
            10.0.3.15 app.test\n\
            # END vith section\n\
            # BEGIN vith section\n\
            10.0.3.16 stale.test\n\
            # END vith section\n";
        let section = ManagedHostSection::parse("/etc/hosts", content);

        assert_eq!(section.get("stale.test"), None);
        assert_eq!(section.render(), content);
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let (_temp_dir, hosts_path) = create_test_hosts_file(MANAGED_HOSTS);

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_absent("app.test");
        section.ensure_absent("api.test");
        section.ensure_present("a.test", Ipv4Addr::new(10, 0, 0, 5));
        section.save(&RenamePromoter).await.unwrap();

        let written = fs::read_to_string(&hosts_path).unwrap();
        assert!(written.starts_with("127.0.0.1\tlocalhost\n"));
        assert!(written.ends_with("# END vith section\n192.168.1.20 nas.lan\n"));

        let reloaded = ManagedHostSection::load(&hosts_path).await.unwrap();
        let bindings: Vec<_> = reloaded
            .bindings()
            .iter()
            .map(|(name, address)| (name.clone(), address.clone()))
            .collect();
        assert_eq!(
            bindings,
            vec![("a.test".to_string(), "10.0.0.5".to_string())]
        );
        assert!(!hosts_path.with_file_name("hosts.vith-new").exists());
    }

    #[tokio::test]
    async fn test_save_if_changed_skips_unchanged_section() {
        let (_temp_dir, hosts_path) = create_test_hosts_file(MANAGED_HOSTS);
        let promoter = CountingPromoter::default();

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_present("app.test", addr(15));
        assert!(!section.save_if_changed(&promoter).await.unwrap());
        assert_eq!(promoter.calls.load(Ordering::SeqCst), 0);

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_present("app.test", addr(20));
        assert!(section.save_if_changed(&promoter).await.unwrap());
        assert_eq!(promoter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_promotion_leaves_original_untouched() {
        let (_temp_dir, hosts_path) = create_test_hosts_file(MANAGED_HOSTS);
        let promoter = CountingPromoter {
            fail: true,
            ..Default::default()
        };

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_absent("app.test");
        let result = section.save(&promoter).await;

        assert!(matches!(result, Err(HostsError::PrivilegedWrite { .. })));
        assert_eq!(fs::read_to_string(&hosts_path).unwrap(), MANAGED_HOSTS);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ManagedHostSection::load(temp_dir.path().join("missing")).await;

        assert!(matches!(result, Err(HostsError::Read { .. })));
    }

    /// Stand-in for `sudo` that runs the command, except `mv`, which fails
    fn create_failing_mv_wrapper(dir: &Path) -> PathBuf {
        let wrapper = dir.join("fake-sudo");
        fs::write(
            &wrapper,
            "#!/bin/sh\n\
             if [ \"$1\" = mv ]; then echo \"mv: device or resource busy\" >&2; exit 1; fi\n\
             exec \"$@\"\n",
        )
        .expect("Failed to write wrapper");
        fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755))
            .expect("Failed to make wrapper executable");
        wrapper
    }

    #[tokio::test]
    async fn test_sudo_promoter_replaces_target() {
        let (_temp_dir, hosts_path) = create_test_hosts_file("127.0.0.1 localhost\n");
        let promoter = SudoPromoter::with_config("env".to_string(), Duration::from_secs(10));

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_present("a.test", Ipv4Addr::new(10, 0, 0, 5));
        section.save(&promoter).await.unwrap();

        assert_eq!(
            fs::read_to_string(&hosts_path).unwrap(),
            "127.0.0.1 localhost\n\
             # BEGIN vith section\n\
             10.0.0.5 a.test\n\
             # END vith section\n"
        );
        assert!(!hosts_path.with_file_name("hosts.vith-new").exists());
    }

    #[tokio::test]
    async fn test_sudo_promoter_failed_rename_cleans_up() {
        let (temp_dir, hosts_path) = create_test_hosts_file(MANAGED_HOSTS);
        let wrapper = create_failing_mv_wrapper(temp_dir.path());
        let promoter = SudoPromoter::with_config(
            wrapper.display().to_string(),
            Duration::from_secs(10),
        );

        let mut section = ManagedHostSection::load(&hosts_path).await.unwrap();
        section.ensure_absent("app.test");
        let result = section.save(&promoter).await;

        match result {
            Err(HostsError::PrivilegedWrite { command, .. }) => assert!(command.contains(" mv ")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&hosts_path).unwrap(), MANAGED_HOSTS);
        assert!(!hosts_path.with_file_name("hosts.vith-new").exists());
    }
}
