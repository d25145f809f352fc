//! Module catalog and per-user access levels.
//!
//! Every application section is a [`Module`]. Users with the `admin` role have
//! implicit `edit` access everywhere; everyone else only has what is stored in
//! `user_module_permissions`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Dashboard,
    Transacoes,
    Clientes,
    Produtos,
    Projetos,
    Servicos,
    Projecao,
    Acompanhamentos,
    Usuarios,
}

/// Catalog row as seeded into `modules_catalog`
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub key: Module,
    pub name: &'static str,
    pub description: &'static str,
    pub sort_order: i32,
}

pub const CATALOG: &[ModuleInfo] = &[
    ModuleInfo { key: Module::Dashboard, name: "Dashboard", description: "Indicadores gerais", sort_order: 10 },
    ModuleInfo { key: Module::Transacoes, name: "Transações", description: "Receitas e despesas", sort_order: 20 },
    ModuleInfo { key: Module::Clientes, name: "Clientes", description: "Cadastro de clientes", sort_order: 30 },
    ModuleInfo { key: Module::Produtos, name: "Produtos", description: "Cadastro de produtos", sort_order: 40 },
    ModuleInfo { key: Module::Projetos, name: "Projetos", description: "Projetos e cronogramas", sort_order: 50 },
    ModuleInfo { key: Module::Servicos, name: "Serviços", description: "Catálogo de serviços", sort_order: 60 },
    ModuleInfo { key: Module::Projecao, name: "Projeção", description: "Orçamento e projeção anual", sort_order: 70 },
    ModuleInfo {
        key: Module::Acompanhamentos,
        name: "Acompanhamentos",
        description: "Propriedades rurais e certificações",
        sort_order: 80,
    },
    ModuleInfo { key: Module::Usuarios, name: "Usuários", description: "Usuários e permissões", sort_order: 90 },
];

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Dashboard => "dashboard",
            Module::Transacoes => "transacoes",
            Module::Clientes => "clientes",
            Module::Produtos => "produtos",
            Module::Projetos => "projetos",
            Module::Servicos => "servicos",
            Module::Projecao => "projecao",
            Module::Acompanhamentos => "acompanhamentos",
            Module::Usuarios => "usuarios",
        }
    }

    pub fn all() -> impl Iterator<Item = Module> {
        CATALOG.iter().map(|m| m.key)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::all()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Módulo desconhecido: {}", s))
    }
}

/// Access level on a module. Ordered: `View < Write < Edit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Read-only listing and detail
    View,
    /// View plus create and import
    Write,
    /// Write plus update and delete
    Edit,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::View => "view",
            AccessLevel::Write => "write",
            AccessLevel::Edit => "edit",
        }
    }

    pub fn allows(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(AccessLevel::View),
            "write" => Ok(AccessLevel::Write),
            "edit" => Ok(AccessLevel::Edit),
            other => Err(format!("Nível de acesso inválido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Perfil inválido: {}", other)),
        }
    }
}

/// Module → level grants for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(pub BTreeMap<Module, AccessLevel>);

impl PermissionSet {
    /// Grants every new non-admin user starts with
    pub fn default_grants() -> Self {
        let mut map = BTreeMap::new();
        map.insert(Module::Dashboard, AccessLevel::View);
        Self(map)
    }

    /// Full access, reported for admins
    pub fn full() -> Self {
        Self(Module::all().map(|m| (m, AccessLevel::Edit)).collect())
    }

    /// Builds a set from stored `(module_key, access_level)` rows, skipping unknown keys.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = BTreeMap::new();
        for (module, level) in rows {
            match (module.parse::<Module>(), level.parse::<AccessLevel>()) {
                (Ok(m), Ok(l)) => {
                    map.insert(m, l);
                }
                _ => tracing::warn!("Ignoring unknown permission row {}={}", module, level),
            }
        }
        Self(map)
    }

    pub fn level(&self, module: Module) -> Option<AccessLevel> {
        self.0.get(&module).copied()
    }

    pub fn allows(&self, module: Module, required: AccessLevel) -> bool {
        self.level(module).is_some_and(|l| l.allows(required))
    }
}

/// Effective access check combining role and grants
pub fn has_access(role: Role, grants: &PermissionSet, module: Module, required: AccessLevel) -> bool {
    match role {
        Role::Admin => true,
        Role::User => grants.allows(module, required),
    }
}
