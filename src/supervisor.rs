//! Lifecycle control of the dnsmasq process.
//!
//! [`DnsmasqSupervisor`] owns at most one dnsmasq child. Start and stop are
//! idempotent: starting a running instance or stopping a stopped one does
//! nothing. Liveness is checked with a non-blocking wait, so an instance that
//! died on its own is treated as stopped and the next start launches a fresh
//! process.
//!
//! # Thread Safety
//!
//! None internally. Lifecycle methods take `&mut self`; callers sharing a
//! supervisor must wrap it in a mutex so check-then-act stays atomic.

use std::io;
use std::process::Stdio;

use tracing::{debug, info, warn};

use crate::args::internal_args;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lease::{Lease, parse_leases};
use crate::reader::{FileReader, FsReader};

/// Name of the supervised binary, resolved through `PATH`.
pub const DNSMASQ_BINARY: &str = "dnsmasq";

/// A launched process the supervisor can poll and kill.
pub trait ManagedProcess {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Returns true once the process has reported an exit status. Never blocks.
    fn has_exited(&mut self) -> bool;

    /// Sends a kill signal without waiting for the process to exit.
    fn kill(&mut self) -> io::Result<()>;
}

/// Creates processes for the supervisor.
pub trait Launcher {
    type Process: ManagedProcess;

    fn launch(&self, program: &str, args: &[String]) -> io::Result<Self::Process>;
}

/// [`Launcher`] built on `tokio::process`.
///
/// Must be used from within a Tokio runtime. The runtime reaps killed
/// children in the background, so stopping never leaves a zombie.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    type Process = tokio::process::Child;

    fn launch(&self, program: &str, args: &[String]) -> io::Result<Self::Process> {
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
    }
}

impl ManagedProcess for tokio::process::Child {
    fn id(&self) -> Option<u32> {
        tokio::process::Child::id(self)
    }

    fn has_exited(&mut self) -> bool {
        match self.try_wait() {
            Ok(Some(status)) => {
                info!("dnsmasq exited: {}", status);
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!("Failed to poll dnsmasq status, assuming it exited: {}", error);
                true
            }
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.start_kill()
    }
}

/// Supervises a single dnsmasq instance.
///
/// # Example
///
/// ```no_run
/// use dnsmasq_supervisor::{Config, DnsmasqSupervisor};
///
/// # async fn example() -> dnsmasq_supervisor::Result<()> {
/// let mut supervisor = DnsmasqSupervisor::new(Config::default());
/// supervisor.start()?;
/// for lease in supervisor.read_leases()? {
///     println!("{} -> {}", lease.mac_address, lease.ip_address);
/// }
/// supervisor.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct DnsmasqSupervisor<R = FsReader, L: Launcher = TokioLauncher> {
    config: Config,
    reader: R,
    launcher: L,
    process: Option<L::Process>,
}

impl DnsmasqSupervisor {
    /// Creates a supervisor that reads from the filesystem and launches via Tokio.
    pub fn new(config: Config) -> Self {
        Self::with_collaborators(config, FsReader, TokioLauncher)
    }
}

impl<R: FileReader, L: Launcher> DnsmasqSupervisor<R, L> {
    pub fn with_collaborators(config: Config, reader: R, launcher: L) -> Self {
        Self {
            config,
            reader,
            launcher,
            process: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the configuration. A running instance keeps its arguments
    /// until the next restart.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Builds the complete argument vector: internal arguments followed by
    /// the configured extra arguments, verbatim.
    pub fn args(&self) -> Result<Vec<String>> {
        let mut args = internal_args(&self.reader, &self.config)?;
        args.extend(self.config.dnsmasq_args.iter().cloned());
        Ok(args)
    }

    /// Returns true if a process is held and has not exited.
    ///
    /// A handle whose process has exited is dropped here.
    pub fn is_running(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            return false;
        };
        if process.has_exited() {
            self.process = None;
            return false;
        }
        true
    }

    /// Process id of the running instance.
    pub fn pid(&mut self) -> Option<u32> {
        if !self.is_running() {
            return None;
        }
        self.process.as_ref().and_then(ManagedProcess::id)
    }

    /// Launches dnsmasq unless it is already running.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the bridge address is malformed
    /// - [`Error::Launch`] if the process could not be created
    ///
    /// No handle is kept on failure.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("dnsmasq already running, start is a no-op");
            return Ok(());
        }

        let args = self.args()?;
        let process = self
            .launcher
            .launch(DNSMASQ_BINARY, &args)
            .map_err(Error::Launch)?;

        info!(
            "Started {} (pid {:?}) with {} arguments",
            DNSMASQ_BINARY,
            process.id(),
            args.len()
        );
        self.process = Some(process);
        Ok(())
    }

    /// Kills dnsmasq if it is running. Does not wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Termination`] if the signal could not be delivered;
    /// the handle is kept in that case.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            debug!("dnsmasq not running, stop is a no-op");
            return Ok(());
        }
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };

        let pid = process.id();
        process.kill().map_err(Error::Termination)?;
        self.process = None;

        info!("Stopped {} (pid {:?})", DNSMASQ_BINARY, pid);
        Ok(())
    }

    /// Stops, then starts. A stop failure is returned without starting.
    pub fn restart(&mut self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    /// Reads and parses the dnsmasq lease database.
    ///
    /// The path comes from the last `--dhcp-leasefile=` extra argument, or
    /// [`DEFAULT_LEASE_FILE`](crate::config::DEFAULT_LEASE_FILE).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileRead`] if the reader fails. There is no retry.
    pub fn read_leases(&self) -> Result<Vec<Lease>> {
        let path = self.config.lease_file_path();
        let content = self
            .reader
            .read_to_string(&path)
            .map_err(|source| Error::FileRead { path, source })?;
        Ok(parse_leases(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::args::FIXED_ARGS;
    use crate::config::DEFAULT_LEASE_FILE;

    #[derive(Clone, Default)]
    struct FakeLauncher {
        launches: Arc<Mutex<Vec<Vec<String>>>>,
        fail_launch: Arc<AtomicBool>,
        exited: Arc<AtomicBool>,
        fail_kill: Arc<AtomicBool>,
        kills: Arc<AtomicUsize>,
    }

    struct FakeProcess {
        id: u32,
        exited: Arc<AtomicBool>,
        fail_kill: Arc<AtomicBool>,
        kills: Arc<AtomicUsize>,
    }

    impl FakeLauncher {
        fn launch_count(&self) -> usize {
            self.launches.lock().unwrap().len()
        }
    }

    impl Launcher for FakeLauncher {
        type Process = FakeProcess;

        fn launch(&self, program: &str, args: &[String]) -> io::Result<FakeProcess> {
            assert_eq!(program, DNSMASQ_BINARY);
            if self.fail_launch.load(Ordering::SeqCst) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            let mut launches = self.launches.lock().unwrap();
            launches.push(args.to_vec());
            self.exited.store(false, Ordering::SeqCst);
            Ok(FakeProcess {
                id: 1000 + launches.len() as u32,
                exited: Arc::clone(&self.exited),
                fail_kill: Arc::clone(&self.fail_kill),
                kills: Arc::clone(&self.kills),
            })
        }
    }

    impl ManagedProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(self.id)
        }

        fn has_exited(&mut self) -> bool {
            self.exited.load(Ordering::SeqCst)
        }

        fn kill(&mut self) -> io::Result<()> {
            if self.fail_kill.load(Ordering::SeqCst) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.kills.fetch_add(1, Ordering::SeqCst);
            self.exited.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    const LEASES: &str = "1700000000 aa:bb:cc:dd:ee:ff 10.1.2.50 myhost 01:aa:bb\n\
                          corrupt line\n\
                          1700000100 11:22:33:44:55:66 10.1.2.51 * *\n";

    fn reader(path: &Path) -> io::Result<String> {
        if path == Path::new(DEFAULT_LEASE_FILE) || path == Path::new("/tmp/custom.leases") {
            Ok(LEASES.to_string())
        } else {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }
    }

    type FnReader = fn(&Path) -> io::Result<String>;

    fn supervisor(config: Config) -> (DnsmasqSupervisor<FnReader, FakeLauncher>, FakeLauncher) {
        let launcher = FakeLauncher::default();
        (
            DnsmasqSupervisor::with_collaborators(config, reader as FnReader, launcher.clone()),
            launcher,
        )
    }

    fn test_config() -> Config {
        Config {
            bridge_address: "10.1.2.1".to_string(),
            dnsmasq_args: vec!["--log-dhcp".to_string(), "--port=0".to_string()],
        }
    }

    #[test]
    fn test_start_appends_extra_args() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();

        let launches = launcher.launches.lock().unwrap();
        let args = &launches[0];
        assert_eq!(args[..3], FIXED_ARGS.map(String::from));
        assert_eq!(
            args[3..],
            [
                "--dhcp-range=10.1.2.50,10.1.2.250,12h".to_string(),
                "--log-dhcp".to_string(),
                "--port=0".to_string(),
            ]
        );
    }

    #[test]
    fn test_start_twice_launches_once() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        supervisor.start().unwrap();

        assert_eq!(launcher.launch_count(), 1);
        assert!(supervisor.is_running());
        assert_eq!(supervisor.pid(), Some(1001));
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.stop().unwrap();

        assert_eq!(launcher.kills.load(Ordering::SeqCst), 0);
        assert!(!supervisor.is_running());
    }

    #[test]
    fn test_stop_kills_and_clears() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        supervisor.stop().unwrap();
        supervisor.stop().unwrap();

        assert_eq!(launcher.kills.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.pid(), None);
    }

    #[test]
    fn test_restart_when_not_running_is_start() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.restart().unwrap();

        assert_eq!(launcher.launch_count(), 1);
        assert_eq!(launcher.kills.load(Ordering::SeqCst), 0);
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_restart_replaces_process() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        supervisor.restart().unwrap();

        assert_eq!(launcher.launch_count(), 2);
        assert_eq!(launcher.kills.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.pid(), Some(1002));
    }

    #[test]
    fn test_launch_failure_keeps_no_handle() {
        let (mut supervisor, launcher) = supervisor(test_config());
        launcher.fail_launch.store(true, Ordering::SeqCst);

        assert!(matches!(supervisor.start(), Err(Error::Launch(_))));
        assert!(!supervisor.is_running());

        launcher.fail_launch.store(false, Ordering::SeqCst);
        supervisor.start().unwrap();
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_kill_failure_surfaces_and_skips_start() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        launcher.fail_kill.store(true, Ordering::SeqCst);

        assert!(matches!(supervisor.restart(), Err(Error::Termination(_))));
        assert_eq!(launcher.launch_count(), 1);
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_restart_start_failure_leaves_stopped() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        launcher.fail_launch.store(true, Ordering::SeqCst);

        assert!(matches!(supervisor.restart(), Err(Error::Launch(_))));
        assert!(!supervisor.is_running());
    }

    #[test]
    fn test_out_of_band_exit() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        launcher.exited.store(true, Ordering::SeqCst);

        supervisor.stop().unwrap();
        assert_eq!(launcher.kills.load(Ordering::SeqCst), 0);

        supervisor.start().unwrap();
        assert_eq!(launcher.launch_count(), 2);
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_invalid_bridge_launches_nothing() {
        let (mut supervisor, launcher) = supervisor(Config {
            bridge_address: "10.1".to_string(),
            dnsmasq_args: vec![],
        });

        assert!(matches!(supervisor.start(), Err(Error::InvalidConfig(_))));
        assert_eq!(launcher.launch_count(), 0);
    }

    #[test]
    fn test_set_config_applies_on_restart() {
        let (mut supervisor, launcher) = supervisor(test_config());
        supervisor.start().unwrap();
        supervisor.set_config(Config {
            bridge_address: "172.16.9.1".to_string(),
            dnsmasq_args: vec![],
        });
        supervisor.restart().unwrap();

        let launches = launcher.launches.lock().unwrap();
        assert_eq!(
            launches[1].last().unwrap(),
            "--dhcp-range=172.16.9.50,172.16.9.250,12h"
        );
    }

    #[test]
    fn test_read_leases_default_path() {
        let (supervisor, _) = supervisor(test_config());
        let leases = supervisor.read_leases().unwrap();

        assert_eq!(leases.len(), 2);
        assert_eq!(leases[0].hostname, "myhost");
        assert_eq!(leases[1].ip_address, "10.1.2.51");
    }

    #[test]
    fn test_read_leases_override_path() {
        let mut config = test_config();
        config
            .dnsmasq_args
            .push("--dhcp-leasefile=/tmp/custom.leases".to_string());
        let (supervisor, _) = supervisor(config);

        assert_eq!(supervisor.read_leases().unwrap().len(), 2);
    }

    #[test]
    fn test_read_leases_propagates_read_error() {
        let mut config = test_config();
        config
            .dnsmasq_args
            .push("--dhcp-leasefile=/tmp/missing.leases".to_string());
        let (supervisor, _) = supervisor(config);

        match supervisor.read_leases() {
            Err(Error::FileRead { path, source }) => {
                assert_eq!(path, Path::new("/tmp/missing.leases"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected FileRead error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_launcher_kill() {
        let mut child = TokioLauncher
            .launch("sleep", &["30".to_string()])
            .unwrap();
        assert!(child.id().is_some());
        assert!(!child.has_exited());

        ManagedProcess::kill(&mut child).unwrap();

        let mut exited = false;
        for _ in 0..50 {
            if child.has_exited() {
                exited = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert!(exited);
    }

    #[tokio::test]
    async fn test_tokio_launcher_missing_binary() {
        let result = TokioLauncher.launch("dnsmasq-supervisor-no-such-binary", &[]);
        assert!(result.is_err());
    }
}
