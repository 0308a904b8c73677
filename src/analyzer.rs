pub mod scope;
pub mod types;

use std::collections::HashMap;

use crate::ast::{
    ClassDecl, ConstDecl, EnumDecl, Expression, ExpressionKind, FuncDecl, MatchCase, Parameter,
    Program, SignalDecl, Statement, StatementKind, VarDecl,
};
use crate::diagnostics::Diagnostics;
use crate::token::TokenKind;

use self::scope::{Scope, ScopeStack};
use self::types::{ClassInfo, FunctionSignature, GdType, Symbol, TypeInfo};

/// Walk state passed explicitly to every analysis routine: the enclosing
/// class/function names, loop nesting, and the stack of expected return
/// types.
#[derive(Debug, Default, Clone)]
pub struct Context {
    pub current_class: Option<String>,
    pub current_function: Option<String>,
    pub in_loop: bool,
    pub expected_returns: Vec<TypeInfo>,
}

/// The analyzer's outputs that outlive the pass. The code generator consults
/// these to resolve identifiers it has not seen itself.
#[derive(Debug)]
pub struct Analysis {
    pub globals: Scope,
    pub classes: HashMap<String, ClassInfo>,
}

/// Name resolution, type inference and checking over the AST. Errors block
/// code generation; warnings do not.
pub struct Analyzer {
    scopes: ScopeStack,
    classes: HashMap<String, ClassInfo>,
    builtin_types: HashMap<String, TypeInfo>,
    diagnostics: Diagnostics,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut analyzer = Self {
            scopes: ScopeStack::new(),
            classes: HashMap::new(),
            builtin_types: HashMap::new(),
            diagnostics: Diagnostics::new("Semantic"),
        };
        analyzer.seed_builtins();
        analyzer
    }

    fn seed_builtins(&mut self) {
        let types = [
            ("int", GdType::Int),
            ("float", GdType::Float),
            ("String", GdType::String),
            ("bool", GdType::Bool),
            ("Array", GdType::Array),
            ("Dictionary", GdType::Dictionary),
            ("Vector2", GdType::Vector2),
            ("Vector3", GdType::Vector3),
            ("Node", GdType::Node),
            ("Object", GdType::Object),
            ("Variant", GdType::Variant),
            ("void", GdType::Void),
        ];
        for (name, base) in types {
            self.builtin_types
                .insert(name.to_string(), TypeInfo::new(base));
        }

        self.scopes.define_function(FunctionSignature::variadic(
            "print",
            TypeInfo::new(GdType::Void),
        ));
        self.scopes.define_function(FunctionSignature::new(
            "range",
            vec![TypeInfo::new(GdType::Int)],
            TypeInfo::new(GdType::Array),
        ));
        self.scopes.define_function(FunctionSignature::new(
            "len",
            vec![TypeInfo::new(GdType::Variant)],
            TypeInfo::new(GdType::Int),
        ));
        self.scopes.define_function(FunctionSignature::new(
            "str",
            vec![TypeInfo::new(GdType::Variant)],
            TypeInfo::new(GdType::String),
        ));
    }

    pub fn analyze(mut self, program: &Program) -> (Analysis, Diagnostics) {
        let mut ctx = Context::default();
        for statement in &program.statements {
            self.statement(statement, &mut ctx);
        }

        (
            Analysis {
                globals: self.scopes.into_global(),
                classes: self.classes,
            },
            self.diagnostics,
        )
    }

    /// Resolves a textual type annotation, including the single-parameter
    /// generic form `Base[Param]` and user-defined class names.
    fn builtin_type(&self, name: &str) -> TypeInfo {
        if let Some(open) = name.find('[') {
            if let Some(close) = name[open..].find(']') {
                let base_name = &name[..open];
                let param_name = &name[open + 1..open + close];
                if let Some(base) = self.builtin_types.get(base_name) {
                    let mut result = base.clone();
                    let param = self.builtin_type(param_name);
                    if param.base != GdType::Unknown {
                        result.generic_params.push(param);
                    }
                    return result;
                }
            }
        }

        if let Some(ty) = self.builtin_types.get(name) {
            return ty.clone();
        }
        if self.classes.contains_key(name) {
            return TypeInfo::custom(name);
        }
        TypeInfo::new(GdType::Unknown)
    }

    fn statement(&mut self, statement: &Statement, ctx: &mut Context) {
        let line = statement.line;
        match &statement.kind {
            StatementKind::Var(decl) => self.var_decl(decl, line, ctx),
            StatementKind::Const(decl) => self.const_decl(decl, line, ctx),
            StatementKind::Func(decl) => self.func_decl(decl, line, ctx),
            StatementKind::Class(decl) => self.class_decl(decl, line, ctx),
            StatementKind::Signal(decl) => self.signal_decl(decl, line),
            StatementKind::Enum(decl) => self.enum_decl(decl, line, ctx),
            StatementKind::Block { statements } => {
                self.scopes.push();
                for child in statements {
                    self.statement(child, ctx);
                }
                self.scopes.pop();
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition, ctx);
                self.check_condition(condition, line);
                self.statement(then_branch, ctx);
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch, ctx);
                }
            }
            StatementKind::While { condition, body } => {
                self.expression(condition, ctx);
                self.check_condition(condition, line);
                let saved = ctx.in_loop;
                ctx.in_loop = true;
                self.statement(body, ctx);
                ctx.in_loop = saved;
            }
            StatementKind::For {
                variable,
                iterable,
                body,
            } => self.for_stmt(variable, iterable, body, line, ctx),
            StatementKind::Match { expression, cases } => self.match_stmt(expression, cases, ctx),
            StatementKind::Return { value } => self.return_stmt(value.as_ref(), line, ctx),
            StatementKind::Expression { expression } => self.expression(expression, ctx),
            StatementKind::Break | StatementKind::Continue => {
                if !ctx.in_loop {
                    self.diagnostics
                        .error(line, "Break/continue statement outside of loop");
                }
            }
            StatementKind::Pass => {}
        }
    }

    fn var_decl(&mut self, decl: &VarDecl, line: u32, ctx: &mut Context) {
        let mut declared_type = TypeInfo::new(GdType::Variant);
        if !decl.type_name.is_empty() {
            declared_type = self.builtin_type(&decl.type_name);
            if declared_type.base == GdType::Unknown {
                self.diagnostics
                    .error(line, format!("Unknown type '{}'", decl.type_name));
            }
        }

        let mut inferred_type = declared_type.clone();
        if let Some(initializer) = &decl.initializer {
            self.expression(initializer, ctx);
            inferred_type = self.expression_type(initializer);

            if !declared_type.is_compatible_with(&inferred_type)
                && declared_type.base != GdType::Variant
            {
                self.diagnostics.error(
                    line,
                    format!("Type mismatch: cannot assign {inferred_type} to {declared_type}"),
                );
            }
        }

        if self.scopes.symbol_in_current(&decl.name) {
            self.diagnostics
                .error(line, format!("Variable '{}' already defined", decl.name));
        }

        let ty = if declared_type.base != GdType::Variant {
            declared_type
        } else {
            inferred_type
        };
        let mut symbol = Symbol::new(decl.name.clone(), ty);
        symbol.is_static = decl.is_static;
        symbol.is_initialized = decl.initializer.is_some();
        symbol.declaration_line = line;
        self.scopes.define_symbol(symbol);
    }

    fn const_decl(&mut self, decl: &ConstDecl, line: u32, ctx: &mut Context) {
        self.expression(&decl.value, ctx);
        let value_type = self.expression_type(&decl.value);

        if self.scopes.symbol_in_current(&decl.name) {
            self.diagnostics
                .error(line, format!("Constant '{}' already defined", decl.name));
        }

        let mut symbol = Symbol::new(decl.name.clone(), value_type);
        symbol.is_constant = true;
        symbol.is_initialized = true;
        symbol.declaration_line = line;
        self.scopes.define_symbol(symbol);
    }

    fn function_signature(&mut self, decl: &FuncDecl, line: u32) -> FunctionSignature {
        let mut parameter_types = Vec::new();
        for param in &decl.parameters {
            let mut param_type = TypeInfo::new(GdType::Variant);
            if !param.type_name.is_empty() {
                param_type = self.builtin_type(&param.type_name);
                if param_type.base == GdType::Unknown {
                    self.diagnostics.error(
                        line,
                        format!("Unknown parameter type '{}'", param.type_name),
                    );
                }
            }
            parameter_types.push(param_type);
        }

        let mut return_type = TypeInfo::new(GdType::Variant);
        if !decl.return_type.is_empty() {
            return_type = self.builtin_type(&decl.return_type);
            if return_type.base == GdType::Unknown {
                self.diagnostics
                    .error(line, format!("Unknown return type '{}'", decl.return_type));
            }
        }

        let mut signature = FunctionSignature::new(decl.name.clone(), parameter_types, return_type);
        signature.is_static = decl.is_static;
        signature.declaration_line = line;
        signature
    }

    fn func_decl(&mut self, decl: &FuncDecl, line: u32, ctx: &mut Context) {
        let signature = self.function_signature(decl, line);

        if self.scopes.function_in_current(&decl.name) {
            self.diagnostics
                .error(line, format!("Function '{}' already defined", decl.name));
        }
        self.scopes.define_function(signature.clone());

        self.function_body(decl, &signature, line, ctx);
    }

    fn function_body(
        &mut self,
        decl: &FuncDecl,
        signature: &FunctionSignature,
        line: u32,
        ctx: &mut Context,
    ) {
        self.scopes.push();
        let saved_function = ctx.current_function.replace(decl.name.clone());
        ctx.expected_returns.push(signature.return_type.clone());

        for (param, ty) in decl.parameters.iter().zip(&signature.parameter_types) {
            let mut symbol = Symbol::new(param.name.clone(), ty.clone());
            symbol.is_initialized = true;
            symbol.declaration_line = line;
            self.scopes.define_symbol(symbol);
        }

        self.statement(&decl.body, ctx);

        ctx.expected_returns.pop();
        ctx.current_function = saved_function;
        self.scopes.pop();
    }

    /// Classes analyze in two passes: signatures and member symbols first,
    /// then every method body. Methods may therefore reference each other
    /// regardless of declaration order.
    fn class_decl(&mut self, decl: &ClassDecl, line: u32, ctx: &mut Context) {
        if self.classes.contains_key(&decl.name) {
            self.diagnostics
                .error(line, format!("Class '{}' already defined", decl.name));
        }

        let mut class_info = ClassInfo::new(decl.name.clone(), decl.base_class.clone(), line);
        let saved_class = ctx.current_class.replace(decl.name.clone());
        self.scopes.push();

        for member in &decl.members {
            match &member.kind {
                StatementKind::Func(func) => {
                    let signature = self.function_signature(func, member.line);
                    if self.scopes.function_in_current(&func.name) {
                        self.diagnostics.error(
                            member.line,
                            format!("Function '{}' already defined", func.name),
                        );
                    }
                    self.scopes.define_function(signature.clone());
                    class_info.methods.insert(func.name.clone(), signature);
                }
                StatementKind::Signal(signal) => {
                    self.statement(member, ctx);
                    class_info.signals.push(signal.name.clone());
                }
                StatementKind::Var(var) => {
                    self.statement(member, ctx);
                    let mut member_type = self.builtin_type(&var.type_name);
                    if member_type.base == GdType::Unknown && !var.type_name.is_empty() {
                        member_type = TypeInfo::new(GdType::Variant);
                    }
                    let mut symbol = Symbol::new(var.name.clone(), member_type);
                    symbol.is_static = var.is_static;
                    class_info.members.insert(var.name.clone(), symbol);
                }
                StatementKind::Const(_) | StatementKind::Enum(_) => self.statement(member, ctx),
                _ => {}
            }
        }

        for member in &decl.members {
            if let StatementKind::Func(func) = &member.kind {
                let Some(signature) = self.scopes.find_function(&func.name).cloned() else {
                    continue;
                };
                self.function_body(func, &signature, member.line, ctx);
            }
        }

        self.classes.insert(decl.name.clone(), class_info);
        ctx.current_class = saved_class;
        self.scopes.pop();
    }

    fn signal_decl(&mut self, decl: &SignalDecl, line: u32) {
        if self.scopes.find_symbol(&decl.name).is_some() {
            self.diagnostics.error(
                line,
                format!("Signal '{}' conflicts with existing symbol", decl.name),
            );
            return;
        }

        for param in &decl.parameters {
            if !param.type_name.is_empty() {
                let param_type = self.builtin_type(&param.type_name);
                if param_type.base == GdType::Unknown {
                    self.diagnostics.error(
                        line,
                        format!("Unknown signal parameter type '{}'", param.type_name),
                    );
                }
            }
        }

        // Signals are usable immediately after declaration.
        let mut symbol = Symbol::new(decl.name.clone(), TypeInfo::new(GdType::Variant));
        symbol.is_initialized = true;
        symbol.declaration_line = line;
        self.scopes.define_symbol(symbol);
    }

    fn enum_decl(&mut self, decl: &EnumDecl, line: u32, ctx: &mut Context) {
        if self.scopes.find_symbol(&decl.name).is_some() {
            self.diagnostics.error(
                line,
                format!("Enum '{}' conflicts with existing symbol", decl.name),
            );
            return;
        }

        let mut enum_symbol = Symbol::new(decl.name.clone(), TypeInfo::custom(&decl.name));
        enum_symbol.is_constant = true;
        enum_symbol.is_initialized = true;
        enum_symbol.declaration_line = line;
        self.scopes.define_symbol(enum_symbol);

        for value in &decl.values {
            if self.scopes.find_symbol(&value.name).is_some() {
                self.diagnostics.error(
                    line,
                    format!("Enum value '{}' conflicts with existing symbol", value.name),
                );
                continue;
            }

            if let Some(expr) = &value.value {
                self.expression(expr, ctx);
                let value_type = self.expression_type(expr);
                if value_type.base != GdType::Int {
                    self.diagnostics.error(
                        line,
                        format!("Enum value '{}' must be an integer", value.name),
                    );
                }
            }

            let mut symbol = Symbol::new(value.name.clone(), TypeInfo::new(GdType::Int));
            symbol.is_constant = true;
            symbol.is_initialized = true;
            symbol.declaration_line = line;
            self.scopes.define_symbol(symbol);
        }
    }

    fn for_stmt(
        &mut self,
        variable: &str,
        iterable: &Expression,
        body: &Statement,
        line: u32,
        ctx: &mut Context,
    ) {
        self.expression(iterable, ctx);
        let iterable_type = self.expression_type(iterable);

        if !matches!(
            iterable_type.base,
            GdType::Array | GdType::String | GdType::Variant
        ) {
            self.diagnostics
                .error(line, format!("Cannot iterate over {iterable_type}"));
        }

        self.scopes.push();

        // Iterating a string yields strings; everything else yields variants.
        let loop_var_type = if iterable_type.base == GdType::String {
            TypeInfo::new(GdType::String)
        } else {
            TypeInfo::new(GdType::Variant)
        };
        let mut loop_var = Symbol::new(variable, loop_var_type);
        loop_var.is_initialized = true;
        loop_var.declaration_line = line;
        self.scopes.define_symbol(loop_var);

        let saved = ctx.in_loop;
        ctx.in_loop = true;
        self.statement(body, ctx);
        ctx.in_loop = saved;

        self.scopes.pop();
    }

    fn match_stmt(&mut self, expression: &Expression, cases: &[MatchCase], ctx: &mut Context) {
        self.expression(expression, ctx);
        let match_type = self.expression_type(expression);

        for case in cases {
            self.expression(&case.pattern, ctx);
            let pattern_type = self.expression_type(&case.pattern);

            if !match_type.is_compatible_with(&pattern_type)
                && pattern_type.base != GdType::Variant
                && match_type.base != GdType::Variant
            {
                self.diagnostics.warning(
                    case.pattern.line,
                    format!(
                        "Pattern type {pattern_type} may not match expression type {match_type}"
                    ),
                );
            }

            self.statement(&case.body, ctx);
        }
    }

    fn return_stmt(&mut self, value: Option<&Expression>, line: u32, ctx: &mut Context) {
        if ctx.current_function.is_none() {
            self.diagnostics
                .error(line, "Return statement outside of function");
            return;
        }

        let mut return_type = TypeInfo::new(GdType::Void);
        if let Some(value) = value {
            self.expression(value, ctx);
            return_type = self.expression_type(value);
        }

        let expected = ctx
            .expected_returns
            .last()
            .cloned()
            .unwrap_or(TypeInfo::new(GdType::Void));
        if !expected.is_compatible_with(&return_type) {
            self.diagnostics.error(
                line,
                format!("Return type mismatch: expected {expected}, got {return_type}"),
            );
        }
    }

    fn check_condition(&mut self, condition: &Expression, line: u32) {
        let condition_type = self.expression_type(condition);
        if condition_type.base != GdType::Bool && condition_type.base != GdType::Variant {
            self.diagnostics.warning(
                line,
                format!("Condition should be boolean, got {condition_type}"),
            );
        }
    }

    fn expression(&mut self, expression: &Expression, ctx: &mut Context) {
        let line = expression.line;
        match &expression.kind {
            ExpressionKind::Literal { .. } => {}
            ExpressionKind::Identifier { name } => self.identifier(name, line),
            ExpressionKind::Binary { left, op, right } => {
                self.expression(left, ctx);
                self.expression(right, ctx);

                let left_type = self.expression_type(left);
                let right_type = self.expression_type(right);
                let result = binary_result_type(&left_type, *op, &right_type);
                if result.base == GdType::Unknown {
                    self.diagnostics.error(
                        line,
                        format!("Type mismatch in binary operation: {left_type} and {right_type}"),
                    );
                }
            }
            ExpressionKind::Unary { op, operand } => {
                self.expression(operand, ctx);
                let operand_type = self.expression_type(operand);
                let result = unary_result_type(*op, &operand_type);
                if result.base == GdType::Unknown {
                    self.diagnostics
                        .error(line, format!("Invalid unary operation on {operand_type}"));
                }
            }
            ExpressionKind::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                self.expression(condition, ctx);
                self.expression(true_expr, ctx);
                self.expression(false_expr, ctx);

                let condition_type = self.expression_type(condition);
                if !matches!(
                    condition_type.base,
                    GdType::Bool | GdType::Variant | GdType::Unknown
                ) {
                    self.diagnostics.warning(
                        line,
                        format!("Ternary condition should be boolean, got {condition_type}"),
                    );
                }

                let true_type = self.expression_type(true_expr);
                let false_type = self.expression_type(false_expr);
                if true_type != false_type
                    && !matches!(true_type.base, GdType::Variant | GdType::Unknown)
                    && !matches!(false_type.base, GdType::Variant | GdType::Unknown)
                {
                    self.diagnostics.warning(
                        line,
                        format!(
                            "Ternary branches have different types: {true_type} and {false_type}"
                        ),
                    );
                }
            }
            ExpressionKind::Call { callee, arguments } => self.call(callee, arguments, line, ctx),
            ExpressionKind::MemberAccess { object, .. } => {
                // Member validation would need per-class field typing.
                self.expression(object, ctx);
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.expression(array, ctx);
                self.expression(index, ctx);

                let array_type = self.expression_type(array);
                let index_type = self.expression_type(index);

                if !matches!(
                    array_type.base,
                    GdType::Array | GdType::String | GdType::Dictionary | GdType::Variant
                ) {
                    self.diagnostics
                        .error(line, format!("Cannot index {array_type}"));
                }

                if matches!(array_type.base, GdType::Array | GdType::String)
                    && !matches!(index_type.base, GdType::Int | GdType::Variant)
                {
                    self.diagnostics.error(
                        line,
                        format!("Array/String index must be integer, got {index_type}"),
                    );
                }
            }
            ExpressionKind::ArrayLiteral { elements } => {
                for element in elements {
                    self.expression(element, ctx);
                }
            }
            ExpressionKind::DictLiteral { pairs } => {
                for (key, value) in pairs {
                    self.expression(key, ctx);
                    self.expression(value, ctx);
                }
            }
            ExpressionKind::Lambda { parameters, body } => self.lambda(parameters, body, ctx),
        }
    }

    fn identifier(&mut self, name: &str, line: u32) {
        if let Some(symbol) = self.scopes.find_symbol(name) {
            let initialized = symbol.is_initialized;
            if !initialized {
                self.diagnostics.warning(
                    line,
                    format!("Variable '{name}' used before initialization"),
                );
            }
        } else if self.scopes.find_function(name).is_none() {
            self.diagnostics
                .error(line, format!("Undefined variable '{name}'"));
        }
    }

    fn call(&mut self, callee: &Expression, arguments: &[Expression], line: u32, ctx: &mut Context) {
        for argument in arguments {
            self.expression(argument, ctx);
        }

        let ExpressionKind::Identifier { name } = &callee.kind else {
            self.expression(callee, ctx);
            return;
        };

        let Some(func) = self.scopes.find_function(name).cloned() else {
            // Possibly a callable variable; resolve it as an identifier.
            self.expression(callee, ctx);
            return;
        };

        if func.is_variadic {
            return;
        }

        if arguments.len() != func.parameter_types.len() {
            self.diagnostics.error(
                line,
                format!(
                    "Function '{}' expects {} arguments, got {}",
                    func.name,
                    func.parameter_types.len(),
                    arguments.len()
                ),
            );
            return;
        }

        for (i, argument) in arguments.iter().enumerate() {
            let arg_type = self.expression_type(argument);
            if !func.parameter_types[i].is_compatible_with(&arg_type) {
                self.diagnostics.error(
                    line,
                    format!(
                        "Argument {} type mismatch: expected {}, got {}",
                        i + 1,
                        func.parameter_types[i],
                        arg_type
                    ),
                );
            }
        }
    }

    fn lambda(&mut self, parameters: &[Parameter], body: &Expression, ctx: &mut Context) {
        self.scopes.push();

        // Lambda parameters default to Variant.
        for param in parameters {
            let mut symbol = Symbol::new(param.name.clone(), TypeInfo::new(GdType::Variant));
            symbol.is_initialized = true;
            self.scopes.define_symbol(symbol);
        }

        self.expression(body, ctx);
        self.scopes.pop();
    }

    /// Infers an expression's type from the current scope chain. Does not
    /// report diagnostics; `expression` does that.
    fn expression_type(&self, expression: &Expression) -> TypeInfo {
        match &expression.kind {
            ExpressionKind::Literal { literal, .. } => match literal {
                TokenKind::Integer => TypeInfo::new(GdType::Int),
                TokenKind::Float => TypeInfo::new(GdType::Float),
                TokenKind::Str => TypeInfo::new(GdType::String),
                TokenKind::Boolean => TypeInfo::new(GdType::Bool),
                TokenKind::Null => TypeInfo::new(GdType::Variant),
                _ => TypeInfo::new(GdType::Unknown),
            },
            ExpressionKind::Identifier { name } => {
                if let Some(symbol) = self.scopes.find_symbol(name) {
                    return symbol.ty.clone();
                }
                if self.scopes.find_function(name).is_some() {
                    // Functions are first-class callables.
                    return TypeInfo::new(GdType::Lambda);
                }
                TypeInfo::new(GdType::Unknown)
            }
            ExpressionKind::Binary { left, op, right } => {
                let left_type = self.expression_type(left);
                let right_type = self.expression_type(right);
                binary_result_type(&left_type, *op, &right_type)
            }
            ExpressionKind::Unary { op, operand } => {
                unary_result_type(*op, &self.expression_type(operand))
            }
            ExpressionKind::Call { callee, .. } => {
                if let ExpressionKind::Identifier { name } = &callee.kind {
                    return self
                        .scopes
                        .find_function(name)
                        .map(|func| func.return_type.clone())
                        .unwrap_or_else(|| TypeInfo::new(GdType::Unknown));
                }
                TypeInfo::new(GdType::Variant)
            }
            ExpressionKind::ArrayLiteral { .. } => TypeInfo::new(GdType::Array),
            ExpressionKind::DictLiteral { .. } => TypeInfo::new(GdType::Dictionary),
            ExpressionKind::Lambda { .. } => TypeInfo::new(GdType::Lambda),
            ExpressionKind::Ternary {
                true_expr,
                false_expr,
                ..
            } => {
                let true_type = self.expression_type(true_expr);
                let false_type = self.expression_type(false_expr);

                if true_type == false_type {
                    return true_type;
                }
                if true_type.base == GdType::Variant {
                    return false_type;
                }
                if false_type.base == GdType::Variant {
                    return true_type;
                }
                if true_type.is_numeric() && false_type.is_numeric() {
                    return widened_numeric(&true_type, &false_type);
                }
                TypeInfo::new(GdType::Variant)
            }
            ExpressionKind::MemberAccess { .. } | ExpressionKind::ArrayAccess { .. } => {
                TypeInfo::new(GdType::Variant)
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn widened_numeric(left: &TypeInfo, right: &TypeInfo) -> TypeInfo {
    if left.base == GdType::Float || right.base == GdType::Float {
        TypeInfo::new(GdType::Float)
    } else {
        TypeInfo::new(GdType::Int)
    }
}

/// Result type of a binary operation; `Unknown` marks an invalid pairing.
fn binary_result_type(left: &TypeInfo, op: TokenKind, right: &TypeInfo) -> TypeInfo {
    // The top type propagates through every operator.
    if left.base == GdType::Variant || right.base == GdType::Variant {
        return TypeInfo::new(GdType::Variant);
    }

    match op {
        TokenKind::Plus => {
            if left.base == GdType::String || right.base == GdType::String {
                return TypeInfo::new(GdType::String);
            }
            if left.is_numeric() && right.is_numeric() {
                return widened_numeric(left, right);
            }
            TypeInfo::new(GdType::Unknown)
        }
        TokenKind::Minus | TokenKind::Multiply | TokenKind::Divide => {
            if left.is_numeric() && right.is_numeric() {
                return widened_numeric(left, right);
            }
            TypeInfo::new(GdType::Unknown)
        }
        TokenKind::Modulo => {
            // "format %s" % [args]
            if left.base == GdType::String && right.base == GdType::Array {
                return TypeInfo::new(GdType::String);
            }
            if left.is_numeric() && right.is_numeric() {
                return widened_numeric(left, right);
            }
            TypeInfo::new(GdType::Unknown)
        }
        TokenKind::Assign
        | TokenKind::PlusAssign
        | TokenKind::MinusAssign
        | TokenKind::MultiplyAssign
        | TokenKind::DivideAssign
        | TokenKind::ModuloAssign => {
            if left.is_compatible_with(right) {
                return left.clone();
            }
            TypeInfo::new(GdType::Unknown)
        }
        TokenKind::InferAssign => right.clone(),
        TokenKind::Equal
        | TokenKind::NotEqual
        | TokenKind::Less
        | TokenKind::LessEqual
        | TokenKind::Greater
        | TokenKind::GreaterEqual => {
            if (left.is_numeric() && right.is_numeric())
                || (left.base == GdType::String && right.base == GdType::String)
            {
                return TypeInfo::new(GdType::Bool);
            }
            TypeInfo::new(GdType::Unknown)
        }
        TokenKind::And | TokenKind::Or | TokenKind::LogicalAnd | TokenKind::LogicalOr => {
            TypeInfo::new(GdType::Bool)
        }
        _ => TypeInfo::new(GdType::Unknown),
    }
}

fn unary_result_type(op: TokenKind, operand: &TypeInfo) -> TypeInfo {
    match op {
        TokenKind::Minus | TokenKind::Plus => {
            if operand.is_numeric() {
                operand.clone()
            } else {
                TypeInfo::new(GdType::Unknown)
            }
        }
        TokenKind::Not | TokenKind::LogicalNot => TypeInfo::new(GdType::Bool),
        _ => TypeInfo::new(GdType::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};
    use indoc::indoc;

    fn analyze(source: &str) -> (Analysis, Diagnostics) {
        let (tokens, lex_diagnostics) = lexer::tokenize(source);
        assert!(!lex_diagnostics.has_errors(), "lex errors in fixture");
        let (program, parse_diagnostics) = parser::parse_tokens(tokens);
        assert!(
            !parse_diagnostics.has_errors(),
            "parse errors in fixture: {:?}",
            parse_diagnostics.iter().collect::<Vec<_>>()
        );
        Analyzer::new().analyze(&program)
    }

    fn analyze_ok(source: &str) -> Analysis {
        let (analysis, diagnostics) = analyze(source);
        assert!(
            !diagnostics.has_errors(),
            "unexpected semantic errors: {:?}",
            diagnostics.iter().collect::<Vec<_>>()
        );
        analysis
    }

    #[test]
    fn infers_int_for_integer_arithmetic() {
        let analysis = analyze_ok("a := 1 + 2\n");
        let symbol = analysis.globals.symbols.get("a").expect("symbol a");
        assert_eq!(symbol.ty.base, GdType::Int);
    }

    #[test]
    fn infers_float_when_either_operand_is_float() {
        let analysis = analyze_ok("a := 1 + 2.5\n");
        assert_eq!(analysis.globals.symbols["a"].ty.base, GdType::Float);
    }

    #[test]
    fn string_concatenation_yields_string() {
        let analysis = analyze_ok("a := \"n=\" + 1\n");
        assert_eq!(analysis.globals.symbols["a"].ty.base, GdType::String);
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let (_, diagnostics) = analyze("print(q)\n");
        assert!(diagnostics.has_errors());
        let first = diagnostics.iter().next().expect("diagnostic");
        assert_eq!(first.message, "Undefined variable 'q'");
        assert_eq!(first.line, 1);
    }

    #[test]
    fn class_methods_may_reference_each_other_forward() {
        let analysis = analyze_ok(indoc! {"
            class C:
                func a():
                    return b()
                func b():
                    return 1
        "});
        let class = analysis.classes.get("C").expect("class C");
        assert!(class.methods.contains_key("a"));
        assert!(class.methods.contains_key("b"));
    }

    #[test]
    fn match_pattern_type_mismatch_is_a_warning_not_error() {
        let (_, diagnostics) = analyze(indoc! {"
            match 3:
                \"x\":
                    pass
        "});
        assert!(!diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("may not match expression type int")));
    }

    #[test]
    fn duplicate_definition_in_same_scope_is_an_error() {
        let (_, diagnostics) = analyze("var x = 1\nvar x = 2\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Variable 'x' already defined")));
    }

    #[test]
    fn shadowing_in_inner_scope_is_allowed() {
        let (_, diagnostics) = analyze(indoc! {"
            var x = 1
            if true:
                var x = 2
                print(x)
        "});
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn unknown_type_annotation_is_an_error() {
        let (_, diagnostics) = analyze("var x: Goblin = 1\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Unknown type 'Goblin'")));
    }

    #[test]
    fn declared_type_mismatch_is_an_error() {
        let (_, diagnostics) = analyze("var x: int = [1, 2]\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Type mismatch: cannot assign Array to int")));
    }

    #[test]
    fn generic_annotation_resolves_base_and_param() {
        let analysis = analyze_ok("var names: Array[String] = []\n");
        let symbol = &analysis.globals.symbols["names"];
        assert_eq!(symbol.ty.base, GdType::Array);
        assert_eq!(symbol.ty.generic_params.len(), 1);
        assert_eq!(symbol.ty.generic_params[0].base, GdType::String);
    }

    #[test]
    fn return_type_mismatch_is_an_error() {
        let (_, diagnostics) = analyze(indoc! {"
            func f() -> int:
                return \"nope\"
        "});
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Return type mismatch: expected int, got String")));
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let (_, diagnostics) = analyze("return 1\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Return statement outside of function")));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let (_, diagnostics) = analyze("break\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Break/continue statement outside of loop")));

        let (_, diagnostics) = analyze(indoc! {"
            while true:
                break
        "});
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn iterating_a_non_iterable_is_an_error() {
        let (_, diagnostics) = analyze(indoc! {"
            for i in 5:
                pass
        "});
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Cannot iterate over int")));
    }

    #[test]
    fn string_iteration_binds_a_string_loop_variable() {
        let (_, diagnostics) = analyze(indoc! {"
            for c in \"abc\":
                s := c + \"!\"
                print(s)
        "});
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn use_before_initialization_is_a_warning() {
        let (_, diagnostics) = analyze("var x\nprint(x)\n");
        assert!(!diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("used before initialization")));
    }

    #[test]
    fn non_boolean_condition_is_a_warning() {
        let (_, diagnostics) = analyze(indoc! {"
            if 1:
                pass
        "});
        assert!(!diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Condition should be boolean, got int")));
    }

    #[test]
    fn mixed_ternary_branches_are_a_warning() {
        let (_, diagnostics) = analyze("a := 1 if true else \"s\"\n");
        assert!(!diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Ternary branches have different types")));
    }

    #[test]
    fn argument_count_mismatch_is_an_error() {
        let (_, diagnostics) = analyze(indoc! {"
            func f(a):
                pass
            f(1, 2)
        "});
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("expects 1 arguments, got 2")));
    }

    #[test]
    fn argument_type_mismatch_is_an_error() {
        let (_, diagnostics) = analyze(indoc! {"
            func f(a: int):
                pass
            f([1])
        "});
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Argument 1 type mismatch")));
    }

    #[test]
    fn variadic_print_accepts_any_arguments() {
        let (_, diagnostics) = analyze("print(1, \"a\", true)\n");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn builtin_len_returns_int() {
        let analysis = analyze_ok("n := len([1, 2])\n");
        assert_eq!(analysis.globals.symbols["n"].ty.base, GdType::Int);
    }

    #[test]
    fn indexing_a_non_indexable_is_an_error() {
        let (_, diagnostics) = analyze("x := 5\ny := x[0]\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Cannot index int")));
    }

    #[test]
    fn signal_conflicts_with_existing_symbol() {
        let (_, diagnostics) = analyze("var hit = 1\nsignal hit\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("Signal 'hit' conflicts with existing symbol")));
    }

    #[test]
    fn enum_values_register_as_int_constants() {
        let analysis = analyze_ok("enum Color { RED, GREEN = 5 }\nc := GREEN\n");
        assert_eq!(analysis.globals.symbols["c"].ty.base, GdType::Int);
        assert!(analysis.globals.symbols["Color"].is_constant);
    }

    #[test]
    fn class_members_and_signals_are_recorded() {
        let analysis = analyze_ok(indoc! {"
            class Player:
                signal died
                var health: int = 100
                func hit(amount: int):
                    pass
        "});
        let class = &analysis.classes["Player"];
        assert!(class.members.contains_key("health"));
        assert_eq!(class.members["health"].ty.base, GdType::Int);
        assert_eq!(class.signals, vec!["died".to_string()]);
        assert!(class.methods.contains_key("hit"));
    }
}
