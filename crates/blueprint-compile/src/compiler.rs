//! The compiler seam.
//!
//! A [`Compiler`] accepts a [`CompilationUnit`] (source files, assembly
//! references, assembly name, optimization level) and returns an
//! [`AssemblyHandle`] or diagnostics. The default [`InMemoryCompiler`]
//! structurally verifies every emitted file and enforces assembly-name
//! uniqueness across generations, so repeated generation cannot shadow a
//! previously loaded assembly.

use std::collections::HashSet;

use blueprint_core::{Diagnostic, OptimizationLevel};
use parking_lot::Mutex;

use crate::emitter::{SourceFile, AUTO_GENERATED_HEADER};

/// Everything a compiler invocation needs.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Unique assembly name for this generation.
    pub assembly_name: String,
    /// Optimization level.
    pub optimization: OptimizationLevel,
    /// Emitted source files.
    pub sources: Vec<SourceFile>,
    /// Referenced assemblies.
    pub references: Vec<String>,
}

/// A type discovered in a compiled assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTypeKey {
    /// Namespace of the type.
    pub namespace: String,
    /// Simple type name.
    pub type_name: String,
    /// Path of the source file the type came from.
    pub path: String,
}

/// Handle to a successfully compiled assembly.
#[derive(Debug, Clone)]
pub struct AssemblyHandle {
    name: String,
    types: Vec<CompiledTypeKey>,
}

impl AssemblyHandle {
    /// The assembly name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every type in the assembly.
    #[must_use]
    pub fn types(&self) -> &[CompiledTypeKey] {
        &self.types
    }

    /// Looks up a type by `(namespace, type name)`.
    #[must_use]
    pub fn find(&self, namespace: &str, type_name: &str) -> Option<&CompiledTypeKey> {
        self.types
            .iter()
            .find(|t| t.namespace == namespace && t.type_name == type_name)
    }
}

/// In-process compiler interface.
pub trait Compiler: Send + Sync {
    /// Compiles a unit into an assembly handle.
    ///
    /// # Errors
    ///
    /// Returns the full diagnostic list when the unit is rejected; the
    /// caller attaches the offending source.
    fn compile(&self, unit: &CompilationUnit) -> Result<AssemblyHandle, Vec<Diagnostic>>;
}

/// Structural verifier acting as the in-memory compiler.
///
/// Checks, per file: the auto-generated header, a type-name comment,
/// lexicographically sorted using declarations, balanced braces (string
/// literals ignored), a namespace declaration, and agreement between the
/// declared class, the declared namespace, and the file path. Across
/// files it rejects duplicate `(namespace, type name)` pairs, and across
/// invocations it rejects a reused assembly name.
#[derive(Debug, Default)]
pub struct InMemoryCompiler {
    used_names: Mutex<HashSet<String>>,
}

impl InMemoryCompiler {
    /// Creates a fresh compiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn verify_file(file: &SourceFile, diagnostics: &mut Vec<Diagnostic>) -> Option<CompiledTypeKey> {
        let mut lines = file.content.lines();

        if lines.next() != Some(AUTO_GENERATED_HEADER) {
            diagnostics.push(Diagnostic::in_file(
                &file.path,
                "missing auto-generated header",
            ));
            return None;
        }
        match lines.next() {
            Some(line) if line.starts_with("// ") => {}
            _ => {
                diagnostics.push(Diagnostic::in_file(&file.path, "missing type-name comment"));
                return None;
            }
        }

        let usings: Vec<&str> = file
            .content
            .lines()
            .filter(|l| l.starts_with("using "))
            .collect();
        let mut sorted = usings.clone();
        sorted.sort_unstable();
        if usings != sorted {
            diagnostics.push(Diagnostic::in_file(
                &file.path,
                "using declarations are not sorted",
            ));
        }

        if let Some(delta) = brace_imbalance(&file.content) {
            diagnostics.push(Diagnostic::in_file(
                &file.path,
                format!("unbalanced braces ({delta:+})"),
            ));
        }

        let namespace = file
            .content
            .lines()
            .find_map(|l| l.trim().strip_prefix("namespace "))
            .map(str::trim);
        let class = file.content.lines().find_map(|l| {
            let trimmed = l.trim();
            trimmed
                .strip_prefix("public class ")
                .map(|rest| rest.split([' ', ':']).next().unwrap_or(rest).trim())
        });

        let (Some(namespace), Some(class)) = (namespace, class) else {
            diagnostics.push(Diagnostic::in_file(
                &file.path,
                "missing namespace or class declaration",
            ));
            return None;
        };

        let expected_path = format!("{}/{class}.cs", namespace.replace('.', "/"));
        if file.path != expected_path {
            diagnostics.push(Diagnostic::in_file(
                &file.path,
                format!("file path does not match declared type (expected {expected_path})"),
            ));
        }

        Some(CompiledTypeKey {
            namespace: namespace.to_string(),
            type_name: class.to_string(),
            path: file.path.clone(),
        })
    }
}

impl Compiler for InMemoryCompiler {
    fn compile(&self, unit: &CompilationUnit) -> Result<AssemblyHandle, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        if unit.assembly_name.trim().is_empty() {
            diagnostics.push(Diagnostic::bare("assembly name must not be empty"));
        } else if !self.used_names.lock().insert(unit.assembly_name.clone()) {
            diagnostics.push(Diagnostic::bare(format!(
                "assembly name '{}' was already used by a previous generation",
                unit.assembly_name
            )));
        }

        let mut types: Vec<CompiledTypeKey> = Vec::with_capacity(unit.sources.len());
        for file in &unit.sources {
            if let Some(key) = Self::verify_file(file, &mut diagnostics) {
                if types
                    .iter()
                    .any(|t| t.namespace == key.namespace && t.type_name == key.type_name)
                {
                    diagnostics.push(Diagnostic::in_file(
                        &file.path,
                        format!("duplicate type {}.{}", key.namespace, key.type_name),
                    ));
                } else {
                    types.push(key);
                }
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        tracing::info!(
            assembly = %unit.assembly_name,
            types = types.len(),
            optimization = ?unit.optimization,
            references = unit.references.len(),
            "compiled generated assembly"
        );
        Ok(AssemblyHandle {
            name: unit.assembly_name.clone(),
            types,
        })
    }
}

/// Returns the net brace imbalance of the source, ignoring braces inside
/// string literals and line comments. `None` means balanced.
fn brace_imbalance(source: &str) -> Option<i64> {
    let mut delta = 0i64;
    for line in source.lines() {
        let mut in_string = false;
        let mut previous = '\0';
        for c in line.chars() {
            if in_string {
                if c == '"' && previous != '\\' {
                    in_string = false;
                }
            } else {
                match c {
                    '"' => in_string = true,
                    '/' if previous == '/' => break,
                    '{' => delta += 1,
                    '}' => delta -= 1,
                    _ => {}
                }
            }
            previous = c;
        }
    }
    (delta != 0).then_some(delta)
}
