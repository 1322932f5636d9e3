//! Locate command - Show which test a line resolves to

use std::path::PathBuf;

use clap::Args;
use pinpoint_core::locator::find_nearest_declaration;
use pinpoint_core::{
    build_filter_args, extract_identifier, BuildDirResolver, Config, ExecutableResolver,
};

use super::{read_lines, zero_based};

/// Arguments for the locate command
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Source file containing the tests
    #[arg(required = true)]
    pub file: PathBuf,

    /// Cursor line (1-based)
    #[arg(short, long, default_value = "1")]
    pub line: usize,
}

impl LocateArgs {
    /// Execute the locate command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let lines = read_lines(&self.file)?;

        let Some((index, declaration)) = find_nearest_declaration(&lines, zero_based(self.line))
        else {
            println!("No test declarations in {}", self.file.display());
            return Ok(());
        };

        let identifier = extract_identifier(declaration);
        let filter = build_filter_args(Some(&identifier));
        let executable = BuildDirResolver::new(&config.build.directory).resolve(&self.file);

        println!("Declaration: {}:{}: {}", self.file.display(), index + 1, declaration.trim());
        println!("Test: {}", identifier);
        if filter.is_empty() {
            println!("Filter: (none - whole executable)");
        } else {
            println!("Filter: {}", filter.join(" "));
        }
        match executable {
            Some(path) => println!("Executable: {}", path.display()),
            None => println!("Executable: (not found in {})", config.build.directory.display()),
        }

        Ok(())
    }
}
