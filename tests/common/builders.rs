//! Test data builders for project files

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Builder for project file text
#[derive(Default)]
pub struct ProjectBuilder {
    lines: Vec<String>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.lines.push(format!("// {}", text));
        self
    }

    pub fn module(mut self, id: u32, prototype: &str) -> Self {
        self.lines.push(format!("MODULE:{}:{}", id, prototype));
        self
    }

    pub fn property(mut self, id: u32, name: &str, value: &str) -> Self {
        self.lines.push(format!("PROPERTY:({},{})={}", id, name, value));
        self
    }

    pub fn connection(mut self, from: (u32, &str), to: (u32, &str)) -> Self {
        self.lines.push(format!(
            "CONNECTION:({},{})->({},{})",
            from.0, from.1, to.0, to.1
        ));
        self
    }

    /// Append a line verbatim
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            let _ = writeln!(text, "{}", line);
        }
        text
    }

    /// Write the project into `dir` and return its path
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).expect("write project file");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_builder() {
        let text = ProjectBuilder::new()
            .comment("two modules")
            .module(0, "Data Module")
            .property(0, "Resolution", "8")
            .connection((0, "out"), (1, "in"))
            .build();

        assert_eq!(
            text,
            "// two modules\nMODULE:0:Data Module\nPROPERTY:(0,Resolution)=8\nCONNECTION:(0,out)->(1,in)\n"
        );
    }
}
