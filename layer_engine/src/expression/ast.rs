use super::jsonpath::JsonPath;
use super::value::ExprValue;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Match,
    NotMatch,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Match => "=~",
            BinaryOp::NotMatch => "!~",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Node {
    Literal(ExprValue),
    /// `${name}` placeholder.
    Variable(String),
    /// `${$.path}` placeholder.
    JsonPath(JsonPath),
    /// The `feature` keyword; members read feature properties.
    Feature,
    Array(Vec<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    Member {
        object: Box<Node>,
        property: Box<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
    MethodCall {
        object: Box<Node>,
        name: String,
        args: Vec<Node>,
    },
}
