//! Method building and frame placement.
//!
//! [`GeneratedMethod`] aggregates the frames contributed for one method,
//! resolves them into an emission order, and writes the method body.
//!
//! Placement is deterministic: frames are visited in contributor order
//! (stage order, then insertion order within a stage) and a depth-first
//! walk hoists each unplaced producer in front of its first consumer.
//! Revisiting a frame that is still on the walk stack means the graph
//! has a cycle, which is fatal. An async frame anywhere makes the whole
//! method async; relative order across the suspension point is never
//! changed.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use blueprint_core::{GenerationError, GenerationResult};

use crate::chain::VariableChain;
use crate::class::InjectedField;
use crate::frame::Frame;
use crate::variable::{variable_key, Variable};
use crate::writer::{SourceWriter, BLOCK};

/// A method of a generated type.
pub struct GeneratedMethod {
    name: String,
    parameters: Vec<Arc<Variable>>,
    frames: Vec<Arc<dyn Frame>>,
    catch_frames: Vec<Arc<dyn Frame>>,
    requires_result: bool,
    result_variable: Option<Arc<Variable>>,
    placed: Vec<Arc<dyn Frame>>,
    placed_catch: Vec<Arc<dyn Frame>>,
    is_async: bool,
    resolved: bool,
}

impl std::fmt::Debug for GeneratedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedMethod")
            .field("name", &self.name)
            .field("frame_count", &self.frames.len())
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl GeneratedMethod {
    /// Creates an empty method.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            frames: Vec::new(),
            catch_frames: Vec::new(),
            requires_result: false,
            result_variable: None,
            placed: Vec::new(),
            placed_catch: Vec::new(),
            is_async: false,
            resolved: false,
        }
    }

    /// Declares a method parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: Arc<Variable>) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Requires the method to end in a value-producing return.
    pub fn require_result(&mut self) {
        self.requires_result = true;
    }

    /// Appends a frame in contributor order.
    pub fn add_frame(&mut self, frame: Arc<dyn Frame>) {
        self.frames.push(frame);
    }

    /// Appends a frame to the exception-handling region.
    pub fn add_catch_frame(&mut self, frame: Arc<dyn Frame>) {
        self.catch_frames.push(frame);
    }

    /// Declares the variable holding the method's result.
    pub fn set_result_variable(&mut self, variable: Arc<Variable>) {
        self.result_variable = Some(variable);
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Arc<Variable>] {
        &self.parameters
    }

    /// The result variable, if one was produced.
    #[must_use]
    pub fn result_variable(&self) -> Option<&Arc<Variable>> {
        self.result_variable.as_ref()
    }

    /// Whether any placed frame is async.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Body frames in emission order. Empty before resolution.
    #[must_use]
    pub fn placed_frames(&self) -> &[Arc<dyn Frame>] {
        &self.placed
    }

    /// Exception-region frames in emission order. Empty before resolution.
    #[must_use]
    pub fn placed_catch_frames(&self) -> &[Arc<dyn Frame>] {
        &self.placed_catch
    }

    /// Resolves variables and fixes the emission order.
    ///
    /// Returns the injected fields the DI bridge created along the way;
    /// the caller attaches them to the enclosing type.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::PipelineCycle`] when the frame graph cycles.
    /// - [`GenerationError::MissingReturnValue`] when a result is
    ///   required but no frame produced the result variable.
    /// - Whatever the DI bridge raises for unresolvable services.
    pub fn resolve(&mut self, mut chain: VariableChain) -> GenerationResult<Vec<InjectedField>> {
        if self.resolved {
            return Err(GenerationError::InvalidState {
                state: "resolved".into(),
                action: "resolve the method again".into(),
            });
        }

        // Every contributor frame's outputs are visible from the start;
        // placement decides ordering, not visibility.
        for frame in self.frames.iter().chain(self.catch_frames.iter()) {
            chain.offer_frame_outputs(frame.as_ref());
        }

        let mut fields = Vec::new();

        let body = std::mem::take(&mut self.frames);
        let mut resolver = FrameResolver::new(&mut chain, body);
        resolver.run()?;
        self.placed = resolver.into_placed();
        fields.extend(chain.take_new_fields());

        let catch = std::mem::take(&mut self.catch_frames);
        let mut resolver = FrameResolver::new(&mut chain, catch);
        resolver.run()?;
        self.placed_catch = resolver.into_placed();
        fields.extend(chain.take_new_fields());

        self.is_async = self
            .placed
            .iter()
            .chain(self.placed_catch.iter())
            .any(|f| f.is_async());

        if self.requires_result && self.result_variable.is_none() {
            return Err(GenerationError::MissingReturnValue {
                operation: chain.operation().to_string(),
                detail: "no placed frame produced the result variable".into(),
            });
        }

        self.resolved = true;
        Ok(fields)
    }

    /// Namespaces the method body requires.
    #[must_use]
    pub fn required_namespaces(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for parameter in &self.parameters {
            out.extend(parameter.variable_type().namespaces());
        }
        for frame in self.placed.iter().chain(self.placed_catch.iter()) {
            out.extend(frame.required_namespaces());
            for variable in frame.creates() {
                out.extend(variable.variable_type().namespaces());
            }
        }
        out
    }

    /// Writes the method: signature, variable declarations, frame bodies
    /// in placement order, and the trailing return.
    ///
    /// # Errors
    ///
    /// Fails when called before [`resolve`](Self::resolve), or when a
    /// frame fails to emit.
    pub fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        if !self.resolved {
            return Err(GenerationError::InvalidState {
                state: "unresolved".into(),
                action: "write the method body".into(),
            });
        }

        let parameters = self
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.variable_type().source_name(), p.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let signature = if self.is_async {
            format!(
                "{BLOCK}public async Task<OperationResult> {}({parameters})",
                self.name
            )
        } else {
            format!("{BLOCK}public OperationResult {}({parameters})", self.name)
        };
        writer.write(&signature);

        let mut declared = false;
        for frame in self.placed.iter().chain(self.placed_catch.iter()) {
            for variable in frame.creates() {
                writer.write(&format!(
                    "{} {} = default;",
                    variable.variable_type().source_name(),
                    variable.name()
                ));
                declared = true;
            }
        }
        if declared {
            writer.blank_line();
        }

        if self.placed_catch.is_empty() {
            self.write_body(writer)?;
        } else {
            writer.write(&format!("{BLOCK}try"));
            self.write_body(writer)?;
            writer.finish_block();
            writer.write(&format!("{BLOCK}catch (System.Exception exception)"));
            for frame in &self.placed_catch {
                frame.write(writer)?;
            }
            writer.finish_block();
        }

        writer.finish_block();
        Ok(())
    }

    fn write_body(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        for frame in &self.placed {
            frame.write(writer)?;
        }
        match &self.result_variable {
            Some(result) => writer.write(&format!("return OperationResult.Ok({});", result.name())),
            None => writer.write("return OperationResult.NoResult();"),
        }
        Ok(())
    }
}

/// Three-color DFS placement over one frame arena.
struct FrameResolver<'c> {
    chain: &'c mut VariableChain,
    arena: Vec<Arc<dyn Frame>>,
    color: Vec<Color>,
    producer: HashMap<usize, usize>,
    placed: Vec<usize>,
    path: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

impl<'c> FrameResolver<'c> {
    fn new(chain: &'c mut VariableChain, frames: Vec<Arc<dyn Frame>>) -> Self {
        let mut resolver = Self {
            chain,
            arena: Vec::new(),
            color: Vec::new(),
            producer: HashMap::new(),
            placed: Vec::new(),
            path: Vec::new(),
        };
        for frame in frames {
            resolver.admit(frame);
        }
        resolver
    }

    fn admit(&mut self, frame: Arc<dyn Frame>) {
        let index = self.arena.len();
        for output in frame.creates() {
            self.producer.insert(variable_key(&output), index);
        }
        self.arena.push(frame);
        self.color.push(Color::White);
    }

    fn run(&mut self) -> GenerationResult<()> {
        let contributed = self.arena.len();
        for index in 0..contributed {
            self.place(index)?;
        }
        Ok(())
    }

    fn place(&mut self, index: usize) -> GenerationResult<()> {
        match self.color[index] {
            Color::Black => return Ok(()),
            Color::Grey => return Err(self.cycle_error(index)),
            Color::White => {}
        }
        self.color[index] = Color::Grey;
        self.path.push(index);

        let reads = self.arena[index].find_variables(self.chain)?;
        for frame in self.chain.take_synthesized_frames() {
            self.admit(frame);
        }
        for variable in reads {
            if let Some(&producer) = self.producer.get(&variable_key(&variable)) {
                if producer != index {
                    self.place(producer)?;
                }
            }
            // No producer: a parameter or an injected field, available
            // without placement.
        }

        self.path.pop();
        self.color[index] = Color::Black;
        self.placed.push(index);
        Ok(())
    }

    fn cycle_error(&self, revisited: usize) -> GenerationError {
        let start = self
            .path
            .iter()
            .position(|&i| i == revisited)
            .unwrap_or(0);
        let mut names: Vec<String> = self.path[start..]
            .iter()
            .map(|&i| self.arena[i].description())
            .collect();
        names.push(self.arena[revisited].description());
        GenerationError::PipelineCycle {
            operation: self.chain.operation().to_string(),
            path: names.join(" -> "),
        }
    }

    fn into_placed(self) -> Vec<Arc<dyn Frame>> {
        self.placed
            .into_iter()
            .map(|i| Arc::clone(&self.arena[i]))
            .collect()
    }
}
