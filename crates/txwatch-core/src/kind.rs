//! Transaction kinds and their static configuration table.

use serde::{Deserialize, Serialize};

/// Static per-kind configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindConfig {
    /// Path under `{base}/tx/` of the build endpoint.
    pub build_path: &'static str,
    /// The backend applies derived database updates after confirmation.
    pub requires_db_update: bool,
    /// The transaction should be followed until on-chain confirmation.
    pub requires_onchain_confirmation: bool,
    /// Kind name the gateway expects in `tx_type`.
    pub gateway_name: &'static str,
    /// Shown to the user once the transaction completes.
    pub success_message: &'static str,
}

impl KindConfig {
    /// Returns `true` if the transaction must be registered and watched.
    pub fn requires_tracking(&self) -> bool {
        self.requires_db_update || self.requires_onchain_confirmation
    }
}

/// Every transaction kind the executor can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    AccessTokenMint,
    CourseCreate,
    CourseTeachersManage,
    CourseModulesManage,
    AssignmentCommit,
    AssignmentAssess,
    CredentialClaim,
    ProjectCreate,
    ProjectTasksManage,
    TaskCommit,
    TaskAssess,
    TreasuryFund,
    AdaTransfer,
}

impl TxKind {
    pub const ALL: [TxKind; 13] = [
        Self::AccessTokenMint,
        Self::CourseCreate,
        Self::CourseTeachersManage,
        Self::CourseModulesManage,
        Self::AssignmentCommit,
        Self::AssignmentAssess,
        Self::CredentialClaim,
        Self::ProjectCreate,
        Self::ProjectTasksManage,
        Self::TaskCommit,
        Self::TaskAssess,
        Self::TreasuryFund,
        Self::AdaTransfer,
    ];

    /// The static configuration for this kind.
    pub fn config(self) -> &'static KindConfig {
        match self {
            Self::AccessTokenMint => &ACCESS_TOKEN_MINT,
            Self::CourseCreate => &COURSE_CREATE,
            Self::CourseTeachersManage => &COURSE_TEACHERS_MANAGE,
            Self::CourseModulesManage => &COURSE_MODULES_MANAGE,
            Self::AssignmentCommit => &ASSIGNMENT_COMMIT,
            Self::AssignmentAssess => &ASSIGNMENT_ASSESS,
            Self::CredentialClaim => &CREDENTIAL_CLAIM,
            Self::ProjectCreate => &PROJECT_CREATE,
            Self::ProjectTasksManage => &PROJECT_TASKS_MANAGE,
            Self::TaskCommit => &TASK_COMMIT,
            Self::TaskAssess => &TASK_ASSESS,
            Self::TreasuryFund => &TREASURY_FUND,
            Self::AdaTransfer => &ADA_TRANSFER,
        }
    }

    /// Kebab-case name used on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Self::AccessTokenMint => "access-token-mint",
            Self::CourseCreate => "course-create",
            Self::CourseTeachersManage => "course-teachers-manage",
            Self::CourseModulesManage => "course-modules-manage",
            Self::AssignmentCommit => "assignment-commit",
            Self::AssignmentAssess => "assignment-assess",
            Self::CredentialClaim => "credential-claim",
            Self::ProjectCreate => "project-create",
            Self::ProjectTasksManage => "project-tasks-manage",
            Self::TaskCommit => "task-commit",
            Self::TaskAssess => "task-assess",
            Self::TreasuryFund => "treasury-fund",
            Self::AdaTransfer => "ada-transfer",
        }
    }

    /// Look up a kind by the name the gateway reports in `tx_type`.
    pub fn from_gateway_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.config().gateway_name == name)
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.slug() == s || k.config().gateway_name == s)
            .ok_or_else(|| format!("unknown transaction kind: {s}"))
    }
}

const ACCESS_TOKEN_MINT: KindConfig = KindConfig {
    build_path: "global/user/access-token/mint",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "access_token_mint",
    success_message: "Access token minted",
};

const COURSE_CREATE: KindConfig = KindConfig {
    build_path: "course/owner/course/create",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "course_create",
    success_message: "Course created",
};

const COURSE_TEACHERS_MANAGE: KindConfig = KindConfig {
    build_path: "course/owner/teachers/manage",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "teachers_update",
    success_message: "Course teachers updated",
};

const COURSE_MODULES_MANAGE: KindConfig = KindConfig {
    build_path: "course/teacher/modules/manage",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "modules_manage",
    success_message: "Course modules published",
};

const ASSIGNMENT_COMMIT: KindConfig = KindConfig {
    build_path: "course/student/assignment/commit",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "assignment_submit",
    success_message: "Assignment submitted",
};

const ASSIGNMENT_ASSESS: KindConfig = KindConfig {
    build_path: "course/teacher/assignments/assess",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "assessment_assess",
    success_message: "Assessment recorded",
};

const CREDENTIAL_CLAIM: KindConfig = KindConfig {
    build_path: "course/student/credential/claim",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "credential_claim",
    success_message: "Credential claimed",
};

const PROJECT_CREATE: KindConfig = KindConfig {
    build_path: "project/owner/project/create",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "project_create",
    success_message: "Project created",
};

const PROJECT_TASKS_MANAGE: KindConfig = KindConfig {
    build_path: "project/manager/tasks/manage",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "tasks_manage",
    success_message: "Project tasks updated",
};

const TASK_COMMIT: KindConfig = KindConfig {
    build_path: "project/contributor/task/commit",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "task_submit",
    success_message: "Task submitted",
};

const TASK_ASSESS: KindConfig = KindConfig {
    build_path: "project/manager/tasks/assess",
    requires_db_update: true,
    requires_onchain_confirmation: true,
    gateway_name: "task_assess",
    success_message: "Task assessed",
};

const TREASURY_FUND: KindConfig = KindConfig {
    build_path: "project/user/treasury/add-funds",
    requires_db_update: false,
    requires_onchain_confirmation: true,
    gateway_name: "treasury_fund",
    success_message: "Treasury funded",
};

const ADA_TRANSFER: KindConfig = KindConfig {
    build_path: "wallet/send",
    requires_db_update: false,
    requires_onchain_confirmation: false,
    gateway_name: "ada_transfer",
    success_message: "Transfer sent",
};
