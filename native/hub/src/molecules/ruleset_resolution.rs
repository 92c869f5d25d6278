// 规则集解析分子模块

pub mod resolver;

pub use resolver::{
    MAX_CONCURRENT_FETCHES, ResolvedRuleset, RulesetDeclaration, RulesetResolver,
};
