//! Mock collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use warren_core::*;
use warren_pkg::{InstallReport, PackageError, PackageManager, Provisioner};

/// Shared, ordered log of everything the collaborators were asked to do
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn contains(&self, call: &str) -> bool {
        self.0.lock().unwrap().iter().any(|c| c == call)
    }
}

pub struct FakeEnvironment {
    pub config: Mutex<FlatConfig>,
    pub graph: Mutex<RelationGraph>,
    log: Arc<CallLog>,
}

impl FakeEnvironment {
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.config
            .lock()
            .unwrap()
            .insert(key.to_string(), value.into());
    }

    pub fn join(&self, endpoint: RelationEndpoint) {
        self.graph.lock().unwrap().insert(endpoint);
    }
}

#[async_trait]
impl HookEnvironment for FakeEnvironment {
    async fn config(&self) -> Result<FlatConfig, CoreError> {
        Ok(self.config.lock().unwrap().clone())
    }

    async fn relations(&self, _names: &[&str]) -> Result<RelationGraph, CoreError> {
        Ok(self.graph.lock().unwrap().clone())
    }

    async fn open_port(&self, port: u16) -> Result<(), CoreError> {
        self.log.push(format!("open-port {port}"));
        Ok(())
    }

    async fn close_port(&self, port: u16) -> Result<(), CoreError> {
        self.log.push(format!("close-port {port}"));
        Ok(())
    }

    async fn relation_set(
        &self,
        relation_id: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<(), CoreError> {
        let pairs: Vec<String> = settings.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.log
            .push(format!("relation-set {relation_id} {}", pairs.join(" ")));
        Ok(())
    }

    async fn private_address(&self) -> Result<String, CoreError> {
        Ok("10.0.0.7".to_string())
    }
}

pub struct FakePackages {
    pub fail_update: AtomicBool,
    pub fail_install: AtomicBool,
    log: Arc<CallLog>,
}

#[async_trait]
impl PackageManager for FakePackages {
    async fn update_index(&self) -> Result<(), PackageError> {
        self.log.push("apt update");
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(PackageError::RepositoryUnavailable("mirror down".to_string()));
        }
        Ok(())
    }

    async fn ensure_installed(&self, names: &[String]) -> Result<InstallReport, PackageError> {
        self.log.push(format!("apt install {}", names.join(" ")));
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(PackageError::PackageNotFound(names.join(" ")));
        }
        Ok(InstallReport {
            requested: names.to_vec(),
            upgraded_count: 0,
            new_count: u32::try_from(names.len()).unwrap(),
        })
    }
}

/// Creates directories for real so later passes can write artifacts
pub struct FakeProvisioner {
    log: Arc<CallLog>,
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn ensure_user(&self, name: &str) -> Result<bool, PackageError> {
        self.log.push(format!("useradd {name}"));
        Ok(true)
    }

    async fn ensure_directory(
        &self,
        path: &Path,
        owner: &str,
        mode: u32,
    ) -> Result<(), PackageError> {
        self.log
            .push(format!("mkdir {} {owner} {mode:o}", path.display()));
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| PackageError::ProvisioningFailed(e.to_string()))
    }

    async fn chown(&self, path: &Path, owner: &str) -> Result<(), PackageError> {
        self.log.push(format!("chown {} {owner}", path.display()));
        Ok(())
    }
}

pub struct FakeToolchain {
    pub fail_build: AtomicBool,
    log: Arc<CallLog>,
}

#[async_trait]
impl BuildToolchain for FakeToolchain {
    async fn wipe_workspace(&self) -> Result<(), CoreError> {
        self.log.push("wipe");
        Ok(())
    }

    async fn fetch(&self) -> Result<(), CoreError> {
        self.log.push("fetch");
        Ok(())
    }

    async fn checkout(&self, target: &Checkout) -> Result<(), CoreError> {
        self.log.push(format!("checkout {target}"));
        Ok(())
    }

    async fn build_and_install(&self) -> Result<(), CoreError> {
        self.log.push("build");
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(CoreError::Build("make install exited 2".to_string()));
        }
        Ok(())
    }
}

pub struct FakeSupervisor {
    pub fail_restart: AtomicBool,
    pub descriptor: Mutex<Option<String>>,
    log: Arc<CallLog>,
}

#[async_trait]
impl ServiceSupervisor for FakeSupervisor {
    async fn install(&self, descriptor: &str) -> Result<(), CoreError> {
        self.log.push("supervisor install");
        *self.descriptor.lock().unwrap() = Some(descriptor.to_string());
        Ok(())
    }

    async fn remove(&self) -> Result<(), CoreError> {
        self.log.push("supervisor remove");
        *self.descriptor.lock().unwrap() = None;
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        self.log.push("supervisor start");
        Ok(())
    }

    async fn stop(&self) -> Result<(), CoreError> {
        self.log.push("supervisor stop");
        Ok(())
    }

    async fn restart(&self) -> Result<(), CoreError> {
        self.log.push("supervisor restart");
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(CoreError::Supervisor("job failed to start".to_string()));
        }
        Ok(())
    }
}

/// A managed instance rooted in a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub log: Arc<CallLog>,
    pub env: Arc<FakeEnvironment>,
    pub packages: Arc<FakePackages>,
    pub provisioner: Arc<FakeProvisioner>,
    pub toolchain: Arc<FakeToolchain>,
    pub supervisor: Arc<FakeSupervisor>,
    pub store: Arc<MemoryStateStore>,
    pub layout: ServiceLayout,
}

impl Harness {
    /// Instance with a complete operator configuration and no relations
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServiceSettings {
            srv_root: dir.path().join("srv"),
            init_dir: dir.path().join("init"),
            ..ServiceSettings::default()
        };
        let layout = ServiceLayout::for_unit("warren/0", &settings).unwrap();
        let log = Arc::new(CallLog::default());

        let config = FlatConfig::from([
            ("source".to_string(), Value::from("branch:main")),
            ("listen-port".to_string(), Value::from(8080)),
            ("session-auth-key".to_string(), Value::from("auth")),
            ("session-encryption-key".to_string(), Value::from("enc")),
            ("mongo-db".to_string(), Value::from("warren")),
            ("smtp-server".to_string(), Value::from("smtp.example.com:25")),
        ]);

        Self {
            env: Arc::new(FakeEnvironment {
                config: Mutex::new(config),
                graph: Mutex::new(RelationGraph::new()),
                log: log.clone(),
            }),
            packages: Arc::new(FakePackages {
                fail_update: AtomicBool::new(false),
                fail_install: AtomicBool::new(false),
                log: log.clone(),
            }),
            provisioner: Arc::new(FakeProvisioner { log: log.clone() }),
            toolchain: Arc::new(FakeToolchain {
                fail_build: AtomicBool::new(false),
                log: log.clone(),
            }),
            supervisor: Arc::new(FakeSupervisor {
                fail_restart: AtomicBool::new(false),
                descriptor: Mutex::new(None),
                log: log.clone(),
            }),
            store: Arc::new(MemoryStateStore::default()),
            log,
            layout,
            dir,
        }
    }

    /// Pretend a previous pass installed `source` and applied `port`
    pub async fn installed(self, source: SourceDescriptor, port: Option<u16>) -> Self {
        let mut state = DurableState {
            applied_port: port,
            ..DurableState::default()
        };
        state.install.record(source);
        self.store.save(&state).await.unwrap();
        tokio::fs::create_dir_all(&self.layout.config_dir)
            .await
            .unwrap();
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            environment: self.env.clone(),
            packages: self.packages.clone(),
            provisioner: self.provisioner.clone(),
            toolchain: self.toolchain.clone(),
            supervisor: self.supervisor.clone(),
            store: self.store.clone(),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.layout.clone(),
            ServiceSettings::default().dependencies,
            Templates::builtin(),
            self.collaborators(),
        )
    }

    pub async fn pass(&self, event: &str) -> Result<PassReport, CoreError> {
        self.reconciler().handle(event.parse()?).await
    }

    pub async fn app_config(&self) -> String {
        tokio::fs::read_to_string(&self.layout.config_file)
            .await
            .unwrap()
    }
}
