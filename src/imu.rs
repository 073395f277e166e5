//! External IMU pipeline supervision
//!
//! The inertial unit is serviced by a separate program with its own
//! publishing path. This module only ties that program's lifetime to the
//! acquisition tasks: spawned after the readers start, killed during
//! shutdown before the tasks are joined.

use std::process::{Child, Command};

/// Handle on the externally managed IMU pipeline
pub struct ImuProcess {
    command: Option<String>,
    child: Option<Child>,
}

impl ImuProcess {
    /// `command` is the full command line; `None` or blank disables the unit
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
            child: None,
        }
    }

    /// Spawn the configured pipeline, if any
    ///
    /// A spawn failure is logged and the rover runs without the IMU.
    pub fn start(&mut self) {
        let Some(command) = self.command.as_deref() else {
            log::info!("IMU: no pipeline configured, skipping");
            return;
        };

        let mut parts = command.split_whitespace();
        let program = match parts.next() {
            Some(program) => program,
            None => return,
        };
        match Command::new(program).args(parts).spawn() {
            Ok(child) => {
                log::info!("IMU: pipeline started (pid {})", child.id());
                self.child = Some(child);
            }
            Err(e) => log::error!("IMU: starting \"{}\" failed: {}", command, e),
        }
    }

    /// Kill the pipeline and collect its exit status
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                log::info!("IMU: pipeline already exited ({})", status);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("IMU: poll failed: {}", e),
        }
        if let Err(e) = child.kill() {
            log::warn!("IMU: kill failed: {}", e);
        }
        match child.wait() {
            Ok(status) => log::info!("IMU: pipeline stopped ({})", status),
            Err(e) => log::warn!("IMU: wait failed: {}", e),
        }
    }
}

impl Drop for ImuProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_start_is_noop() {
        let mut imu = ImuProcess::new(None);
        imu.start();
        assert!(imu.child.is_none());
        imu.stop();

        let mut imu = ImuProcess::new(Some("   ".to_string()));
        imu.start();
        assert!(imu.child.is_none());
    }

    #[test]
    fn test_start_and_stop_pipeline() {
        let mut imu = ImuProcess::new(Some("sleep 5".to_string()));
        imu.start();
        assert!(imu.child.is_some());
        imu.stop();
        assert!(imu.child.is_none());
    }

    #[test]
    fn test_missing_program_logs_and_continues() {
        let mut imu = ImuProcess::new(Some("/nonexistent/imu-pipeline --flag".to_string()));
        imu.start();
        assert!(imu.child.is_none());
    }
}
