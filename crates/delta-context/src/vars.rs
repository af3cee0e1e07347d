//! `${AGENT_HOME}` / `${CWD}` / `${RUN_ID}` substitution.

/// Variables available for substitution in context-manifest paths and
/// commands. Shared with the tool/hook executors, which resolve the
/// same two variables in argv templates.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub agent_home: String,
    pub cwd: String,
    pub run_id: String,
}

/// Replace `${AGENT_HOME}`, `${CWD}`, `${RUN_ID}` occurrences in `input`.
/// Unknown `${...}` tokens are left untouched — no other variables are
/// defined at this layer.
pub fn substitute(input: &str, vars: &TemplateVars) -> String {
    input
        .replace("${AGENT_HOME}", &vars.agent_home)
        .replace("${CWD}", &vars.cwd)
        .replace("${RUN_ID}", &vars.run_id)
}
