
    use super::*;
    use std::panic;
    use tempfile::TempDir;

    fn temp_pid_file() -> (TempDir, PidFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");
        (dir, PidFile::new(path))
    }

    #[test]
    fn test_pid_file_new() {
        let pid = PidFile::new("/tmp/test.pid");
        assert_eq!(pid.path(), Path::new("/tmp/test.pid"));
        assert!(!pid.is_locked());
    }

    #[test]
    fn test_pid_file_not_exists() {
        let (_dir, pid) = temp_pid_file();
        assert!(!pid.exists());
        assert!(pid.read_pid().unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_pid() {
        let (_dir, mut pid) = temp_pid_file();
        pid.write_pid_value(12345).unwrap();

        assert!(pid.exists());
        assert_eq!(pid.read_pid().unwrap(), Some(12345));
        assert_eq!(fs::read_to_string(pid.path()).unwrap(), "12345\n");
        assert!(pid.is_locked());
    }

    #[test]
    fn test_remove_pid_file() {
        let (_dir, mut pid) = temp_pid_file();
        pid.write_pid_value(12345).unwrap();

        pid.remove().unwrap();
        assert!(!pid.exists());
        assert!(!pid.is_locked());
        assert!(pid.remove().is_ok());
    }

    #[test]
    fn test_invalid_contents() {
        let (_dir, pid) = temp_pid_file();
        fs::write(pid.path(), "not-a-pid").unwrap();
        assert!(matches!(
            pid.read_pid(),
            Err(BootstrapError::PidFileRead { .. })
        ));
    }

    #[test]
    fn test_try_acquire_new() {
        let (_dir, mut pid) = temp_pid_file();
        pid.try_acquire().unwrap();
        assert!(pid.is_locked());
        assert_eq!(pid.read_pid().unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_try_acquire_live_process() {
        let (dir, mut first) = temp_pid_file();
        first.try_acquire().unwrap();

        let mut second = PidFile::new(dir.path().join("test.pid"));
        let err = second.try_acquire().unwrap_err();
        assert!(matches!(err, BootstrapError::AlreadyRunning { pid, .. } if pid == std::process::id()));
        assert!(!second.is_locked());
        assert!(first.exists());
    }

    #[test]
    fn test_try_acquire_replaces_stale_file() {
        let (_dir, mut pid) = temp_pid_file();
        // Beyond the default pid_max, so never a live process.
        fs::write(pid.path(), "99999999\n").unwrap();

        pid.try_acquire().unwrap();
        assert_eq!(pid.read_pid().unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_try_acquire_replaces_empty_file() {
        let (_dir, mut pid) = temp_pid_file();
        fs::write(pid.path(), "").unwrap();

        pid.try_acquire().unwrap();
        assert!(pid.is_locked());
        assert_eq!(pid.read_pid().unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_try_acquire_replaces_garbage() {
        let (_dir, mut pid) = temp_pid_file();
        fs::write(pid.path(), "12ab\n").unwrap();

        pid.try_acquire().unwrap();
        assert_eq!(
            fs::read_to_string(pid.path()).unwrap(),
            format!("{}\n", std::process::id())
        );
    }

    #[test]
    fn test_try_acquire_unreadable_file_is_fatal() {
        let (_dir, mut pid) = temp_pid_file();
        fs::create_dir(pid.path()).unwrap();

        assert!(matches!(
            pid.try_acquire(),
            Err(BootstrapError::PidFileRead { .. })
        ));
        assert!(!pid.is_locked());
        assert!(pid.path().is_dir());
    }

    #[test]
    fn test_is_process_running() {
        assert!(PidFile::is_process_running(std::process::id()));
        assert!(!PidFile::is_process_running(0));
        assert!(!PidFile::is_process_running(u32::MAX));
    }

    #[test]
    fn test_drop_removes_file() {
        let (_dir, mut pid) = temp_pid_file();
        let path = pid.path().to_path_buf();
        pid.write_pid().unwrap();
        assert!(path.exists());

        drop(pid);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_leaves_foreign_file() {
        let (_dir, pid) = temp_pid_file();
        let path = pid.path().to_path_buf();
        fs::write(&path, "1\n").unwrap();

        drop(pid);
        assert!(path.exists());
    }

    #[test]
    fn test_removed_while_unwinding() {
        let (_dir, mut pid) = temp_pid_file();
        let path = pid.path().to_path_buf();
        pid.write_pid().unwrap();

        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            let _held = pid;
            panic!("daemon crashed");
        }));
        assert!(result.is_err());
        assert!(!path.exists());
    }
