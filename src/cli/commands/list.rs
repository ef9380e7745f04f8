//! `list`: print the projects a group filter selects.

use crate::cli::output::{Output, Table};
use crate::core::group::GroupFilter;
use crate::core::manifest::Manifest;

pub fn run_list(manifest: &Manifest, filter: &GroupFilter) {
    let filtered = manifest.filter_groups(filter);
    if filtered.projects.is_empty() {
        Output::info("no projects match the given group filter");
        return;
    }

    let mut table = Table::new(vec!["Path", "Name", "Remote", "Revision"]);
    for project in &filtered.projects {
        table.add_row(vec![
            &project.path,
            &project.name,
            &project.remote_name,
            &project.revision,
        ]);
    }
    table.print();
}
