//! Fix expressions: `;`-separated actions applied to a violating object.

use bpa_model::{ModelGraphMut, ObjectRef};
use tracing::debug;

use crate::ast::{Expr, Statement};
use crate::compile::{Compiler, Context, Node};
use crate::error::{ActionError, CompileError, EvalError};
use crate::eval::{Deadline, Evaluator, Frame, object_of, text_of};
use crate::parser::parse_statements;

#[derive(Debug)]
enum Step {
    Assign {
        target: Node,
        property: String,
        value: Node,
    },
    Delete,
    SetAnnotation {
        key: Node,
        value: Node,
    },
    RemoveAnnotation {
        key: Node,
    },
}

/// A compiled fix expression.
#[derive(Debug)]
pub struct CompiledAction {
    source: String,
    steps: Vec<Step>,
}

impl Compiler {
    pub fn action(&self, text: &str) -> Result<CompiledAction, CompileError> {
        let statements = parse_statements(text)?;
        let ctx = self.root_context();
        let steps = statements
            .iter()
            .map(|statement| self.step(statement, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledAction {
            source: text.to_string(),
            steps,
        })
    }

    fn step(&self, statement: &Statement, ctx: Context<'_>) -> Result<Step, CompileError> {
        match statement {
            Statement::Assign { target, value } => {
                let (target, property) = match target {
                    Expr::Ident { name, .. }
                        if !["it", "outerIt", "Model"]
                            .iter()
                            .any(|binding| binding.eq_ignore_ascii_case(name)) =>
                    {
                        (Node::It, self.assignable(name)?)
                    }
                    Expr::Member { target, name, .. } => (self.expr(target, ctx)?.0, name.clone()),
                    other => {
                        return Err(CompileError::NotAssignable {
                            target: other.path(),
                        });
                    }
                };
                let (value, _) = self.expr(value, ctx)?;
                Ok(Step::Assign {
                    target,
                    property,
                    value,
                })
            }
            Statement::Call(Expr::Call {
                target,
                name,
                args,
                ..
            }) if target
                .as_deref()
                .is_none_or(|target| matches!(target, Expr::Ident { name, .. } if name.eq_ignore_ascii_case("it"))) =>
            {
                let expect = |count: usize, expected: &'static str| {
                    if args.len() == count {
                        Ok(())
                    } else {
                        Err(CompileError::Arity {
                            name: name.clone(),
                            expected,
                            found: args.len(),
                        })
                    }
                };
                if name.eq_ignore_ascii_case("Delete") {
                    expect(0, "0")?;
                    Ok(Step::Delete)
                } else if name.eq_ignore_ascii_case("SetAnnotation") {
                    expect(2, "2")?;
                    Ok(Step::SetAnnotation {
                        key: self.expr(&args[0], ctx)?.0,
                        value: self.expr(&args[1], ctx)?.0,
                    })
                } else if name.eq_ignore_ascii_case("RemoveAnnotation") {
                    expect(1, "1")?;
                    Ok(Step::RemoveAnnotation {
                        key: self.expr(&args[0], ctx)?.0,
                    })
                } else {
                    Err(CompileError::UnknownFunction { name: name.clone() })
                }
            }
            Statement::Call(other) => Err(CompileError::UnknownFunction { name: other.path() }),
        }
    }
}

impl CompiledAction {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether any step deletes the object.
    pub fn is_destructive(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::Delete))
    }

    /// Apply every step to `object` in order, returning the number of steps
    /// executed. Values are evaluated against the graph as it stands before
    /// each step. A failing step stops the fix; earlier steps stay applied and
    /// their count is carried in the [`ActionError`].
    pub fn apply<G: ModelGraphMut + ?Sized>(
        &self,
        graph: &mut G,
        object: ObjectRef,
    ) -> Result<usize, ActionError> {
        for (applied, step) in self.steps.iter().enumerate() {
            run_step(step, graph, object).map_err(|error| ActionError { applied, error })?;
        }
        debug!(object = %object, steps = self.steps.len(), "fix applied");
        Ok(self.steps.len())
    }
}

fn run_step<G: ModelGraphMut + ?Sized>(
    step: &Step,
    graph: &mut G,
    object: ObjectRef,
) -> Result<(), EvalError> {
    match step {
        Step::Assign {
            target,
            property,
            value,
        } => {
            let (target, value) = {
                let evaluator = Evaluator::new(&*graph, Deadline::none());
                let frame = Frame::root(object);
                let target = object_of(&evaluator.eval(target, &frame)?, property)?;
                let value = evaluator.eval(value, &frame)?.to_value()?;
                (target, value)
            };
            graph.set_property(target, property, value)?;
        }
        Step::Delete => graph.delete(object)?,
        Step::SetAnnotation { key, value } => {
            let (key, value) = {
                let evaluator = Evaluator::new(&*graph, Deadline::none());
                let frame = Frame::root(object);
                let key = evaluator.eval(key, &frame)?;
                let value = evaluator.eval(value, &frame)?;
                (text_of(&key, "SetAnnotation")?.to_string(), value)
            };
            let value = (!value.is_null()).then(|| value.to_string());
            graph.set_annotation(object, &key, value)?;
        }
        Step::RemoveAnnotation { key } => {
            let key = {
                let evaluator = Evaluator::new(&*graph, Deadline::none());
                let key = evaluator.eval(key, &Frame::root(object))?;
                text_of(&key, "RemoveAnnotation")?.to_string()
            };
            graph.set_annotation(object, &key, None)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bpa_model::ScopeTag;

    use super::*;

    #[test]
    fn derived_property_cannot_be_assigned() {
        let compiler = Compiler::for_scope([ScopeTag::DataColumn]);
        assert_eq!(
            compiler.action("Table = null").expect_err("derived"),
            CompileError::NotAssignable {
                target: "Table".into()
            }
        );
    }

    #[test]
    fn bindings_cannot_be_assigned() {
        assert!(matches!(
            Compiler::new().action("it = null"),
            Err(CompileError::NotAssignable { .. })
        ));
    }

    #[test]
    fn delete_is_destructive() {
        let compiler = Compiler::for_scope([ScopeTag::Measure]);
        assert!(compiler.action("Delete()").expect("compiles").is_destructive());
        assert!(!compiler
            .action("IsHidden = true; SetAnnotation(\"k\", \"v\")")
            .expect("compiles")
            .is_destructive());
    }

    #[test]
    fn unknown_action() {
        assert_eq!(
            Compiler::new().action("Frobnicate()").expect_err("unknown"),
            CompileError::UnknownFunction {
                name: "Frobnicate".into()
            }
        );
        assert!(matches!(
            Compiler::new().action("Delete(1)"),
            Err(CompileError::Arity { .. })
        ));
    }
}
