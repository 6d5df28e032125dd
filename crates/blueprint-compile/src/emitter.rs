//! Assembly emission.
//!
//! Serializes every generated type to a source file with a fixed layout:
//!
//! ```text
//! // <auto-generated />
//! // Acme.Generated.EmptyOperationExecutor
//! using Blueprint;
//! using System;
//! ...                       (sorted lexicographically)
//!
//! namespace Acme.Generated
//! {
//!     public class EmptyOperationExecutor : IOperationExecutor
//!     ...
//! }
//! ```
//!
//! One file per type at `<namespace-with-slashes>/<TypeName>.cs`. The
//! layout is a snapshot contract; nothing here may vary between runs for
//! a fixed input.

use std::collections::BTreeSet;
use std::sync::Arc;

use blueprint_core::GenerationResult;
use blueprint_codegen::{GeneratedType, SourceWriter};

/// Fixed header of every generated file.
pub const AUTO_GENERATED_HEADER: &str = "// <auto-generated />";

/// Namespaces every generated file imports regardless of content.
const BASELINE_NAMESPACES: &[&str] = &["Blueprint", "Blueprint.Logging", "System", "System.Threading.Tasks"];

/// One emitted source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative path, namespace dots flattened to directories.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// Serializes generated types into source files and tracks the assembly
/// reference closure.
#[derive(Debug, Default)]
pub struct AssemblyEmitter {
    types: Vec<Arc<GeneratedType>>,
    references: BTreeSet<String>,
}

impl AssemblyEmitter {
    /// Creates an emitter with the baseline assembly references.
    #[must_use]
    pub fn new() -> Self {
        let mut emitter = Self::default();
        emitter.add_reference("Blueprint.Core");
        emitter
    }

    /// Adds a generated type to the assembly.
    pub fn add_type(&mut self, generated: Arc<GeneratedType>) {
        self.types.push(generated);
    }

    /// Registers an assembly reference.
    pub fn add_reference(&mut self, assembly: impl Into<String>) {
        self.references.insert(assembly.into());
    }

    /// The types queued for emission.
    #[must_use]
    pub fn types(&self) -> &[Arc<GeneratedType>] {
        &self.types
    }

    /// The referenced assemblies, sorted.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        self.references.iter().cloned().collect()
    }

    /// File path for a type.
    #[must_use]
    pub fn path_for(namespace: &str, type_name: &str) -> String {
        format!("{}/{type_name}.cs", namespace.replace('.', "/"))
    }

    /// Emits every type to its source file.
    ///
    /// # Errors
    ///
    /// Propagates frame emission failures (which indicate an unresolved
    /// method, a programming error upstream).
    pub fn emit(&self) -> GenerationResult<Vec<SourceFile>> {
        let mut files = Vec::with_capacity(self.types.len());
        for generated in &self.types {
            files.push(self.emit_type(generated)?);
        }
        Ok(files)
    }

    fn emit_type(&self, generated: &GeneratedType) -> GenerationResult<SourceFile> {
        let mut writer = SourceWriter::new();
        writer.write(AUTO_GENERATED_HEADER);
        writer.comment(&format!(
            "{}.{}",
            generated.namespace(),
            generated.name()
        ));

        let mut namespaces: BTreeSet<String> = BASELINE_NAMESPACES
            .iter()
            .map(ToString::to_string)
            .collect();
        namespaces.extend(generated.required_namespaces());
        namespaces.remove(generated.namespace());
        // The snapshot contract sorts the declarations themselves, which
        // differs from sorted namespaces once one is a prefix of another.
        let mut declarations: Vec<String> = namespaces
            .into_iter()
            .map(|ns| format!("using {ns};"))
            .collect();
        declarations.sort_unstable();
        for declaration in &declarations {
            writer.write(declaration);
        }
        writer.blank_line();

        writer.namespace(generated.namespace());
        generated.write(&mut writer)?;
        writer.finish_block();

        Ok(SourceFile {
            path: Self::path_for(generated.namespace(), generated.name()),
            content: writer.into_code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_codegen::{GeneratedMethod, InjectedField, VariableChain};
    use blueprint_core::TypeRef;

    fn resolved_type() -> GeneratedType {
        let mut class = GeneratedType::new("Acme.Generated", "EmptyOperationExecutor", "empty")
            .implementing("IOperationExecutor");
        class
            .add_injected_field(InjectedField::new(
                TypeRef::in_namespace("Acme.Services", "IInjectable"),
                TypeRef::in_namespace("Acme.Services", "Injectable"),
            ))
            .expect("adds");
        let mut method = GeneratedMethod::new("ExecuteAsync");
        method
            .resolve(VariableChain::new("empty", vec![]))
            .expect("resolves");
        class.add_method(method);
        class
    }

    #[test]
    fn test_file_layout() {
        let mut emitter = AssemblyEmitter::new();
        emitter.add_type(Arc::new(resolved_type()));
        let files = emitter.emit().expect("emits");
        assert_eq!(files.len(), 1);

        let file = &files[0];
        assert_eq!(file.path, "Acme/Generated/EmptyOperationExecutor.cs");

        let lines: Vec<&str> = file.content.lines().collect();
        assert_eq!(lines[0], "// <auto-generated />");
        assert_eq!(lines[1], "// Acme.Generated.EmptyOperationExecutor");
        assert!(file.content.contains("namespace Acme.Generated"));
    }

    #[test]
    fn test_usings_are_sorted_and_deduplicated() {
        let mut emitter = AssemblyEmitter::new();
        emitter.add_type(Arc::new(resolved_type()));
        let files = emitter.emit().expect("emits");

        let usings: Vec<&str> = files[0]
            .content
            .lines()
            .filter(|l| l.starts_with("using "))
            .collect();
        let mut sorted = usings.clone();
        sorted.sort_unstable();
        assert_eq!(usings, sorted);
        assert!(usings.contains(&"using Acme.Services;"));
        assert!(usings.contains(&"using System.Threading.Tasks;"));
        // Own namespace is never imported.
        assert!(!usings.contains(&"using Acme.Generated;"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let mut a = AssemblyEmitter::new();
        a.add_type(Arc::new(resolved_type()));
        let mut b = AssemblyEmitter::new();
        b.add_type(Arc::new(resolved_type()));

        assert_eq!(a.emit().expect("emits"), b.emit().expect("emits"));
    }

    #[test]
    fn test_reference_closure_is_sorted() {
        let mut emitter = AssemblyEmitter::new();
        emitter.add_reference("Zeta");
        emitter.add_reference("Alpha");
        emitter.add_reference("Alpha");
        assert_eq!(emitter.references(), ["Alpha", "Blueprint.Core", "Zeta"]);
    }
}
