// Expression lexing, parsing and evaluation

pub mod lexer;
pub mod parser;
pub mod eval;
pub mod functions;
pub mod quantity;
pub mod plot;

pub use eval::{Bindings, Evaluator, NumericEvaluator};
pub use functions::BuiltinSet;
pub use plot::{PlotDomain, PlotSampler, SampleSet};
