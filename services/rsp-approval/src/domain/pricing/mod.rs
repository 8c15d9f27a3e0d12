//! 价格推导
//!
//! 从建议零售价（RSP）逐层剥离税费与加价，得到 BPTT、CIF、GSV、
//! 贸易费用和毛利。纯计算，不做任何 I/O。

mod calculator;
mod error;
mod inputs;

pub use calculator::*;
pub use error::*;
pub use inputs::*;
