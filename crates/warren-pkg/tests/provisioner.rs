use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use warren_exec::{CommandExecutor, CommandResult, CommandSpec, ExecError};
use warren_pkg::{PackageError, Provisioner, SystemProvisioner};

/// Executor answering `id -u` with a fixed status and succeeding otherwise
struct AccountExecutor {
    user_exists: bool,
    fail_program: Option<&'static str>,
    seen: Mutex<Vec<CommandSpec>>,
}

impl AccountExecutor {
    fn new(user_exists: bool) -> Arc<Self> {
        Arc::new(Self {
            user_exists,
            fail_program: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn programs(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program().to_string())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for AccountExecutor {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.seen.lock().unwrap().push(cmd.clone());
        let status = match cmd.program() {
            "id" if !self.user_exists => 1,
            program if Some(program) == self.fail_program => 1,
            _ => 0,
        };
        Ok(CommandResult {
            status,
            stdout: String::new(),
            stderr: if status == 0 { String::new() } else { "nope".to_string() },
            duration: Duration::from_millis(1),
        })
    }

    async fn run_with_timeout(
        &self,
        cmd: &CommandSpec,
        _timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.run(cmd).await
    }
}

#[tokio::test]
async fn test_ensure_user_creates_missing_account() {
    let executor = AccountExecutor::new(false);
    let provisioner = SystemProvisioner::new(executor.clone(), false);

    let created = provisioner.ensure_user("warren").await.unwrap();

    assert!(created);
    assert_eq!(executor.programs(), vec!["id", "useradd"]);
}

#[tokio::test]
async fn test_ensure_user_is_idempotent() {
    let executor = AccountExecutor::new(true);
    let provisioner = SystemProvisioner::new(executor.clone(), false);

    let created = provisioner.ensure_user("warren").await.unwrap();

    assert!(!created);
    assert_eq!(executor.programs(), vec!["id"]);
}

#[tokio::test]
async fn test_ensure_directory_uses_octal_mode() {
    let executor = AccountExecutor::new(true);
    let provisioner = SystemProvisioner::new(executor.clone(), true);

    provisioner
        .ensure_directory(Path::new("/srv/warren-warren"), "warren", 0o755)
        .await
        .unwrap();

    let seen = executor.seen.lock().unwrap();
    assert_eq!(seen[0].program(), "install");
    assert_eq!(seen[0].get_user(), Some("root"));
    assert_eq!(
        seen[0].get_args(),
        &["-d", "-o", "warren", "-g", "warren", "-m", "755", "/srv/warren-warren"]
    );
}

#[tokio::test]
async fn test_chown_failure_is_provisioning_error() {
    let executor = Arc::new(AccountExecutor {
        user_exists: true,
        fail_program: Some("chown"),
        seen: Mutex::new(Vec::new()),
    });
    let provisioner = SystemProvisioner::new(executor, false);

    let err = provisioner
        .chown(Path::new("/srv/x/etc/warren-config.yaml"), "warren")
        .await
        .unwrap_err();

    assert!(matches!(err, PackageError::ProvisioningFailed(_)));
}
