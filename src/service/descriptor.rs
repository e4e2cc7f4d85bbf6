use crate::config::Config;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub const SYNC_PORT: u16 = 8001;
pub const API_PORT: u16 = 8000;
pub const UI_PORT: u16 = 8501;

/// The services this tool knows how to provision and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownService {
    /// CRM data-sync API
    Sync,
    /// API backend
    Backend,
    /// UI frontend
    Frontend,
}

impl KnownService {
    /// Declared order: start walks it forwards, stop walks it backwards.
    pub const ALL: [KnownService; 3] = [
        KnownService::Sync,
        KnownService::Backend,
        KnownService::Frontend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KnownService::Sync => "sync",
            KnownService::Backend => "backend",
            KnownService::Frontend => "frontend",
        }
    }

    /// Canonical name or alias (`api`, `ui`, `crm-sync`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sync" | "crm-sync" | "crm-sync-api" => Some(KnownService::Sync),
            "backend" | "api" => Some(KnownService::Backend),
            "frontend" | "ui" => Some(KnownService::Frontend),
            _ => None,
        }
    }

    pub fn port(self) -> u16 {
        match self {
            KnownService::Sync => SYNC_PORT,
            KnownService::Backend => API_PORT,
            KnownService::Frontend => UI_PORT,
        }
    }

    fn default_dir(self) -> &'static str {
        match self {
            KnownService::Sync => "crm-sync-api",
            KnownService::Backend => "backend",
            KnownService::Frontend => "frontend",
        }
    }

    fn default_command(self) -> String {
        match self {
            KnownService::Sync | KnownService::Backend => format!(
                "venv/bin/uvicorn app.main:app --host 0.0.0.0 --port {}",
                self.port()
            ),
            KnownService::Frontend => format!(
                "venv/bin/streamlit run app.py --server.port {} --server.headless true",
                self.port()
            ),
        }
    }

    /// Settings synthesized when a service ships no template.
    fn default_settings(self) -> Option<Vec<(String, String)>> {
        match self {
            KnownService::Frontend => Some(vec![(
                "API_BASE_URL".to_string(),
                format!("http://localhost:{}", API_PORT),
            )]),
            KnownService::Sync | KnownService::Backend => None,
        }
    }
}

/// Everything the orchestrator needs to provision, start and stop one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub working_directory: PathBuf,
    pub start_command: String,
    pub listen_port: u16,
    pub log_path: PathBuf,
    pub pid_path: PathBuf,
    /// Must exist before the service may start; never created by this tool.
    pub runtime_env: PathBuf,
    pub config_path: PathBuf,
    pub template_path: PathBuf,
    pub default_settings: Option<Vec<(String, String)>>,
}

impl ServiceDescriptor {
    pub fn resolve(service: KnownService, config: &Config, work_dir: &Path) -> Self {
        let overrides = config.service_override(service);
        let cwd = overrides
            .and_then(|o| o.cwd.as_deref())
            .unwrap_or(service.default_dir());
        let working_directory = work_dir.join(cwd);
        let runtime_env = working_directory.join(
            overrides
                .and_then(|o| o.runtime_env.as_deref())
                .unwrap_or("venv"),
        );
        let start_command = overrides
            .and_then(|o| o.command.clone())
            .unwrap_or_else(|| service.default_command());
        let logs_dir = work_dir.join(&config.logs_dir);

        Self {
            name: service.name().to_string(),
            config_path: working_directory.join(".env"),
            template_path: working_directory.join(".env.example"),
            working_directory,
            start_command,
            listen_port: service.port(),
            log_path: logs_dir.join(format!("{}.log", service.name())),
            pid_path: logs_dir.join(format!("{}.pid", service.name())),
            runtime_env,
            default_settings: service.default_settings(),
        }
    }
}

/// All known services in declared order.
pub fn descriptors(config: &Config, work_dir: &Path) -> Vec<ServiceDescriptor> {
    KnownService::ALL
        .iter()
        .map(|s| ServiceDescriptor::resolve(*s, config, work_dir))
        .collect()
}

/// Resolve a CLI target: a service name, an alias, or `all`.
pub fn select(config: &Config, work_dir: &Path, target: &str) -> Result<Vec<ServiceDescriptor>> {
    if target == "all" {
        return Ok(descriptors(config, work_dir));
    }
    let service =
        KnownService::from_name(target).ok_or_else(|| Error::UnknownService(target.to_string()))?;
    Ok(vec![ServiceDescriptor::resolve(service, config, work_dir)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceOverride;

    #[test]
    fn fixed_ports() {
        assert_eq!(KnownService::Sync.port(), 8001);
        assert_eq!(KnownService::Backend.port(), 8000);
        assert_eq!(KnownService::Frontend.port(), 8501);
    }

    #[test]
    fn default_layout() {
        let d = ServiceDescriptor::resolve(KnownService::Sync, &Config::default(), Path::new("/srv"));
        assert_eq!(d.working_directory, PathBuf::from("/srv/crm-sync-api"));
        assert_eq!(d.runtime_env, PathBuf::from("/srv/crm-sync-api/venv"));
        assert_eq!(d.log_path, PathBuf::from("/srv/logs/sync.log"));
        assert_eq!(d.pid_path, PathBuf::from("/srv/logs/sync.pid"));
        assert_eq!(d.config_path, PathBuf::from("/srv/crm-sync-api/.env"));
        assert!(d.start_command.contains("--port 8001"));
        assert!(d.default_settings.is_none());
    }

    #[test]
    fn frontend_has_default_endpoint() {
        let d = ServiceDescriptor::resolve(
            KnownService::Frontend,
            &Config::default(),
            Path::new("/srv"),
        );
        assert_eq!(
            d.default_settings,
            Some(vec![(
                "API_BASE_URL".to_string(),
                "http://localhost:8000".to_string()
            )])
        );
    }

    #[test]
    fn overrides_apply_but_port_stays() {
        let mut config = Config::default();
        config.services.insert(
            "backend".to_string(),
            ServiceOverride {
                cwd: Some("api".to_string()),
                command: Some("sleep 60".to_string()),
                runtime_env: Some(".venv".to_string()),
            },
        );
        let d = ServiceDescriptor::resolve(KnownService::Backend, &config, Path::new("/w"));
        assert_eq!(d.working_directory, PathBuf::from("/w/api"));
        assert_eq!(d.runtime_env, PathBuf::from("/w/api/.venv"));
        assert_eq!(d.start_command, "sleep 60");
        assert_eq!(d.listen_port, 8000);
    }

    #[test]
    fn select_all_is_declared_order() {
        let names: Vec<_> = select(&Config::default(), Path::new("/w"), "all")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["sync", "backend", "frontend"]);
    }

    #[test]
    fn select_accepts_aliases_and_rejects_unknown() {
        let ui = select(&Config::default(), Path::new("/w"), "ui").unwrap();
        assert_eq!(ui[0].name, "frontend");
        assert!(matches!(
            select(&Config::default(), Path::new("/w"), "worker"),
            Err(Error::UnknownService(_))
        ));
    }
}
