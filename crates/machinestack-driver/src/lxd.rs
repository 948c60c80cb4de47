//! LXD driver — manages containers through the `lxc` client binary.
//!
//! Recognised options:
//!
//! | key                 | default    | meaning                                        |
//! |---------------------|------------|------------------------------------------------|
//! | `lxd.binary`        | `lxc`      | client executable                              |
//! | `lxd.remote`        | (none)     | `host:port` of the LXD daemon to target        |
//! | `lxd.trust_password`| (none)     | password used when registering the remote      |
//! | `lxd.image_remote`  | `images`   | remote prefixed to bare image references       |
//! | `lxd.profile`       | (none)     | profile applied at launch                      |
//! | `lxd.shell`         | `/bin/bash`| command started by interactive sessions        |
//!
//! Without `lxd.remote` the client's default (local) daemon is used. With
//! it, the remote is registered with the client under a derived alias on
//! first use and every machine is addressed as `<alias>:<name>`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::driver::{Driver, MachineAttributes};
use crate::error::{DriverError, DriverResult};
use crate::kind::DriverKind;
use crate::options::DriverOptions;
use crate::session::{ControlMessage, ControlReceiver, SessionStreams, TerminalSize, signal_number};

const DEFAULT_BINARY: &str = "lxc";
const DEFAULT_IMAGE_REMOTE: &str = "images";
const DEFAULT_SHELL: &str = "/bin/bash";

/// A remote LXD daemon the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Remote {
    alias: String,
    address: String,
    trust_password: Option<String>,
}

/// Driver for LXD containers.
#[derive(Debug, Clone)]
pub struct LxdDriver {
    binary: String,
    remote: Option<Remote>,
    image_remote: String,
    profile: Option<String>,
    shell: String,
}

impl LxdDriver {
    /// Build a driver from the merged option map.
    pub fn from_options(options: &DriverOptions) -> DriverResult<Self> {
        let binary = options.get("lxd.binary").unwrap_or(DEFAULT_BINARY);
        if binary.trim().is_empty() {
            return Err(DriverError::InvalidOption {
                key: "lxd.binary".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let remote = match options.remote(DriverKind::Lxd).map(str::trim) {
            Some("") | None => None,
            Some(address) => Some(Remote {
                alias: remote_alias(address),
                address: address.to_string(),
                trust_password: options.get("lxd.trust_password").map(str::to_string),
            }),
        };

        Ok(Self {
            binary: binary.to_string(),
            remote,
            image_remote: options
                .get("lxd.image_remote")
                .unwrap_or(DEFAULT_IMAGE_REMOTE)
                .to_string(),
            profile: options.get("lxd.profile").map(str::to_string),
            shell: options.get("lxd.shell").unwrap_or(DEFAULT_SHELL).to_string(),
        })
    }

    /// The client-side name of a machine, qualified with the remote alias.
    fn target(&self, name: &str) -> String {
        match &self.remote {
            Some(remote) => format!("{}:{name}", remote.alias),
            None => name.to_string(),
        }
    }

    /// Qualify a bare image reference with the image remote.
    fn image_ref(&self, image: &str) -> String {
        if image.contains(':') || self.image_remote.is_empty() {
            image.to_string()
        } else {
            format!("{}:{image}", self.image_remote)
        }
    }

    fn launch_args(&self, name: &str, image: &str, attrs: &MachineAttributes) -> Vec<String> {
        let mut args = vec![
            "launch".to_string(),
            self.image_ref(image),
            self.target(name),
        ];
        if let Some(profile) = &self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        if let Some(cpu) = attrs.cpu {
            args.extend(["--config".to_string(), format!("limits.cpu={cpu}")]);
        }
        if let Some(memory) = &attrs.memory {
            args.extend(["--config".to_string(), format!("limits.memory={memory}")]);
        }
        args
    }

    fn delete_args(&self, name: &str) -> Vec<String> {
        vec!["delete".to_string(), "--force".to_string(), self.target(name)]
    }

    fn exec_args(&self, name: &str, size: TerminalSize) -> Vec<String> {
        vec![
            "exec".to_string(),
            self.target(name),
            "--force-noninteractive".to_string(),
            "--env".to_string(),
            format!("COLUMNS={}", size.width),
            "--env".to_string(),
            format!("LINES={}", size.height),
            "--".to_string(),
            self.shell.clone(),
        ]
    }

    /// Run the client to completion, returning stdout.
    async fn run(&self, operation: &'static str, machine: &str, args: &[String]) -> DriverResult<String> {
        debug!(binary = %self.binary, ?args, "running lxc");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                DriverError::operation(operation, machine, format!("failed to run {}: {e}", self.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.binary, output.status),
                trimmed => trimmed.to_string(),
            };
            return Err(DriverError::operation(operation, machine, message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Register the bound remote with the client if it isn't known yet.
    async fn ensure_remote(&self, operation: &'static str, machine: &str) -> DriverResult<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };

        let list = ["remote", "list", "--format", "csv"].map(String::from);
        let known = self.run(operation, machine, &list).await?;
        if remote_listed(&known, &remote.alias) {
            return Ok(());
        }

        let mut add = vec![
            "remote".to_string(),
            "add".to_string(),
            remote.alias.clone(),
            format!("https://{}", remote.address),
            "--accept-certificate".to_string(),
        ];
        if let Some(password) = &remote.trust_password {
            add.push(format!("--password={password}"));
        }
        self.run(operation, machine, &add).await?;
        info!(alias = %remote.alias, address = %remote.address, "lxd remote registered");
        Ok(())
    }

    fn apply_control(
        &self,
        machine: &str,
        pid: Option<u32>,
        message: &ControlMessage,
        size: &mut TerminalSize,
    ) {
        match message {
            ControlMessage::Resize { width, height } => {
                *size = TerminalSize::new(*width, *height);
                // Sessions run over pipes, so there is no remote pty to resize.
                debug!(%machine, %size, "terminal resize recorded");
            }
            ControlMessage::Signal { name } => deliver_signal(machine, pid, name),
        }
    }
}

#[async_trait]
impl Driver for LxdDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Lxd
    }

    async fn create(&self, name: &str, image: &str, attrs: &MachineAttributes) -> DriverResult<()> {
        self.ensure_remote("create", name).await?;
        self.run("create", name, &self.launch_args(name, image, attrs))
            .await?;
        info!(machine = %name, %image, target = %self.target(name), "container launched");
        Ok(())
    }

    async fn delete(&self, name: &str) -> DriverResult<()> {
        self.ensure_remote("delete", name).await?;
        self.run("delete", name, &self.delete_args(name)).await?;
        info!(machine = %name, target = %self.target(name), "container deleted");
        Ok(())
    }

    async fn session(
        &self,
        name: &str,
        streams: SessionStreams,
        mut control: ControlReceiver,
        size: TerminalSize,
    ) -> DriverResult<()> {
        self.ensure_remote("session", name).await?;

        let mut child = Command::new(&self.binary)
            .args(self.exec_args(name, size))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::operation("session", name, format!("failed to spawn {}: {e}", self.binary))
            })?;
        let pid = child.id();

        let (Some(mut child_stdin), Some(mut child_stdout), Some(mut child_stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(DriverError::operation("session", name, "child stdio was not captured"));
        };
        let SessionStreams {
            mut stdin,
            mut stdout,
            mut stderr,
        } = streams;
        info!(machine = %name, %size, "session started");

        // The caller may keep stdin open forever; the session ends with the
        // remote process, not with stdin.
        let input = tokio::spawn(async move {
            let copied = tokio::io::copy(&mut stdin, &mut child_stdin).await;
            let _ = child_stdin.shutdown().await;
            copied
        });

        let output = async {
            tokio::try_join!(
                pump(&mut child_stdout, &mut stdout),
                pump(&mut child_stderr, &mut stderr),
            )
        };
        tokio::pin!(output);

        let mut size = size;
        let mut control_open = true;
        let mut output_done = false;
        let waited = loop {
            tokio::select! {
                result = &mut output, if !output_done => {
                    if let Err(e) = result {
                        input.abort();
                        return Err(e.into());
                    }
                    output_done = true;
                }
                message = control.recv(), if control_open => match message {
                    Some(message) => self.apply_control(name, pid, &message, &mut size),
                    None => control_open = false,
                },
                status = child.wait() => break status,
            }
        };

        let drained = if output_done { Ok(()) } else { output.await.map(|_| ()) };
        input.abort();
        let status = waited?;
        drained?;

        match status.code() {
            Some(code) => info!(machine = %name, code, %size, "session ended"),
            None => info!(machine = %name, %size, "session ended by signal"),
        }
        Ok(())
    }
}

async fn pump<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::io::copy(reader, writer).await?;
    writer.flush().await
}

fn deliver_signal(machine: &str, pid: Option<u32>, signal: &str) {
    let Some(number) = signal_number(signal) else {
        warn!(%machine, %signal, "ignoring unknown signal");
        return;
    };
    let Some(pid) = pid else {
        debug!(%machine, %signal, "session process already reaped");
        return;
    };
    // SAFETY: `pid` is our own child, which stays unreaped until `wait`
    // returns, and `kill` has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid as libc::pid_t, number) };
    if rc == 0 {
        debug!(%machine, %signal, pid, "signal forwarded");
    } else {
        warn!(%machine, %signal, pid, error = %std::io::Error::last_os_error(), "signal delivery failed");
    }
}

/// Client alias for a remote address, e.g. `10.0.0.5:8443` → `ms-10-0-0-5-8443`.
fn remote_alias(address: &str) -> String {
    let sanitized: String = address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("ms-{}", sanitized.trim_matches('-'))
}

/// Whether `lxc remote list --format csv` output contains `alias`.
fn remote_listed(csv: &str, alias: &str) -> bool {
    csv.lines()
        .filter_map(|line| line.split(',').next())
        .filter_map(|name| name.split_whitespace().next())
        .any(|name| name == alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use tokio::io::AsyncReadExt;

    use crate::session::control_channel;

    fn options(pairs: &[(&str, &str)]) -> DriverOptions {
        DriverOptions::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    /// Write a stand-in `lxc` that logs its arguments and mimics the
    /// subcommands the driver uses.
    fn fake_lxc(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
for last; do :; done
case "$1" in
  remote)
    if [ "$2" = list ]; then
      echo "images,https://images.linuxcontainers.org,simplestreams,none,YES,NO,NO"
      echo "local (current),unix://,lxd,file access,NO,YES,NO"
    fi
    ;;
  launch) ;;
  delete)
    if [ "$3" = missing ]; then echo "Error: Instance not found" >&2; exit 1; fi
    ;;
  exec)
    if [ "$last" = wait-for-term ]; then
      trap 'echo got-term; exit 0' TERM
      echo ready
      while :; do sleep 0.05; done
    fi
    echo ready
    cat
    echo done >&2
    ;;
esac
"#,
            log = log.display()
        );
        let path = dir.join("lxc");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn local_target_is_bare_name() {
        let driver = LxdDriver::from_options(&DriverOptions::default()).unwrap();
        assert_eq!(driver.target("m1"), "m1");
        assert_eq!(driver.binary, "lxc");
    }

    #[test]
    fn remote_target_uses_derived_alias() {
        let driver = LxdDriver::from_options(&options(&[("lxd.remote", "10.0.0.5:8443")])).unwrap();
        assert_eq!(driver.target("m1"), "ms-10-0-0-5-8443:m1");
    }

    #[test]
    fn blank_remote_means_local() {
        let driver = LxdDriver::from_options(&options(&[("lxd.remote", "  ")])).unwrap();
        assert!(driver.remote.is_none());
    }

    #[test]
    fn bare_images_get_image_remote() {
        let driver = LxdDriver::from_options(&DriverOptions::default()).unwrap();
        assert_eq!(driver.image_ref("ubuntu/trusty"), "images:ubuntu/trusty");
        assert_eq!(driver.image_ref("local:custom"), "local:custom");

        let driver = LxdDriver::from_options(&options(&[("lxd.image_remote", "")])).unwrap();
        assert_eq!(driver.image_ref("ubuntu/trusty"), "ubuntu/trusty");
    }

    #[test]
    fn launch_args_carry_attributes_and_profile() {
        let driver = LxdDriver::from_options(&options(&[("lxd.profile", "small")])).unwrap();
        let attrs = MachineAttributes {
            cpu: Some(2),
            memory: Some("512MB".to_string()),
        };

        let args = driver.launch_args("m1", "ubuntu/trusty", &attrs);
        assert_eq!(
            args,
            vec![
                "launch",
                "images:ubuntu/trusty",
                "m1",
                "--profile",
                "small",
                "--config",
                "limits.cpu=2",
                "--config",
                "limits.memory=512MB",
            ]
        );
    }

    #[test]
    fn exec_args_pass_initial_size() {
        let driver = LxdDriver::from_options(&options(&[("lxd.shell", "/bin/sh")])).unwrap();
        let args = driver.exec_args("m1", TerminalSize::new(132, 43));
        assert!(args.contains(&"COLUMNS=132".to_string()));
        assert!(args.contains(&"LINES=43".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/bin/sh"));
    }

    #[test]
    fn remote_alias_is_client_safe() {
        assert_eq!(remote_alias("Node-A.example:8443"), "ms-node-a-example-8443");
        assert_eq!(remote_alias("[::1]:8443"), "ms-1--8443");
    }

    #[test]
    fn remote_listing_matches_first_column() {
        let csv = "images,https://images.linuxcontainers.org,simplestreams\nlocal (current),unix://,lxd\n";
        assert!(remote_listed(csv, "images"));
        assert!(remote_listed(csv, "local"));
        assert!(!remote_listed(csv, "ms-10-0-0-5-8443"));
    }

    #[tokio::test]
    async fn create_and_delete_invoke_client() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_lxc(dir.path());
        let driver = LxdDriver::from_options(&options(&[(
            "lxd.binary",
            binary.to_str().unwrap(),
        )]))
        .unwrap();

        driver
            .create("m1", "ubuntu/trusty", &MachineAttributes::default())
            .await
            .unwrap();
        driver.delete("m1").await.unwrap();

        assert_eq!(
            calls(dir.path()),
            vec!["launch images:ubuntu/trusty m1", "delete --force m1"]
        );
    }

    #[tokio::test]
    async fn remote_is_registered_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_lxc(dir.path());
        let driver = LxdDriver::from_options(&options(&[
            ("lxd.binary", binary.to_str().unwrap()),
            ("lxd.remote", "10.0.0.5:8443"),
        ]))
        .unwrap();

        driver
            .create("m1", "ubuntu/trusty", &MachineAttributes::default())
            .await
            .unwrap();

        assert_eq!(
            calls(dir.path()),
            vec![
                "remote list --format csv",
                "remote add ms-10-0-0-5-8443 https://10.0.0.5:8443 --accept-certificate",
                "launch images:ubuntu/trusty ms-10-0-0-5-8443:m1",
            ]
        );
    }

    #[tokio::test]
    async fn client_failure_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_lxc(dir.path());
        let driver = LxdDriver::from_options(&options(&[(
            "lxd.binary",
            binary.to_str().unwrap(),
        )]))
        .unwrap();

        let err = driver.delete("missing").await.unwrap_err();
        match err {
            DriverError::Operation {
                operation,
                machine,
                message,
            } => {
                assert_eq!(operation, "delete");
                assert_eq!(machine, "missing");
                assert_eq!(message, "Error: Instance not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_operation_error() {
        let driver = LxdDriver::from_options(&options(&[(
            "lxd.binary",
            "/nonexistent/machinestack-lxc",
        )]))
        .unwrap();

        let err = driver.delete("m1").await.unwrap_err();
        assert!(matches!(err, DriverError::Operation { operation: "delete", .. }));
    }

    #[tokio::test]
    async fn session_pumps_all_streams() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_lxc(dir.path());
        let driver = LxdDriver::from_options(&options(&[(
            "lxd.binary",
            binary.to_str().unwrap(),
        )]))
        .unwrap();

        let (mut stdin_tx, stdin_rx) = tokio::io::duplex(1024);
        let (stdout_tx, mut stdout_rx) = tokio::io::duplex(1024);
        let (stderr_tx, mut stderr_rx) = tokio::io::duplex(1024);
        let (_control_tx, control_rx) = control_channel(4);

        stdin_tx.write_all(b"hello\n").await.unwrap();
        drop(stdin_tx);

        driver
            .session(
                "m1",
                SessionStreams::new(stdin_rx, stdout_tx, stderr_tx),
                control_rx,
                TerminalSize::default(),
            )
            .await
            .unwrap();

        let mut out = String::new();
        stdout_rx.read_to_string(&mut out).await.unwrap();
        let mut err = String::new();
        stderr_rx.read_to_string(&mut err).await.unwrap();

        assert_eq!(out, "ready\nhello\n");
        assert_eq!(err, "done\n");
        assert!(calls(dir.path())[0].starts_with("exec m1 --force-noninteractive"));
    }

    #[tokio::test]
    async fn session_forwards_signals_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_lxc(dir.path());
        let driver = LxdDriver::from_options(&options(&[
            ("lxd.binary", binary.to_str().unwrap()),
            ("lxd.shell", "wait-for-term"),
        ]))
        .unwrap();

        // stdin stays open for the whole session.
        let (_stdin_tx, stdin_rx) = tokio::io::duplex(64);
        let (stdout_tx, mut stdout_rx) = tokio::io::duplex(1024);
        let (stderr_tx, _stderr_rx) = tokio::io::duplex(1024);
        let (control_tx, control_rx) = control_channel(4);

        let session = tokio::spawn(async move {
            driver
                .session(
                    "m1",
                    SessionStreams::new(stdin_rx, stdout_tx, stderr_tx),
                    control_rx,
                    TerminalSize::default(),
                )
                .await
        });

        let mut ready = [0u8; 6];
        stdout_rx.read_exact(&mut ready).await.unwrap();
        assert_eq!(&ready, b"ready\n");

        control_tx
            .send(ControlMessage::Resize {
                width: 100,
                height: 30,
            })
            .await
            .unwrap();
        control_tx
            .send(ControlMessage::Signal {
                name: "SIGTERM".to_string(),
            })
            .await
            .unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), session)
            .await
            .expect("session did not end after SIGTERM")
            .unwrap();
        assert!(result.is_ok());

        let mut rest = String::new();
        stdout_rx.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "got-term\n");
    }
}
