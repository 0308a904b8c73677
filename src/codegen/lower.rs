use std::collections::HashMap;

use crate::analyzer::Analysis;
use crate::ast::{
    ClassDecl, ConstDecl, Expression, ExpressionKind, FuncDecl, MatchCase, Parameter, Program,
    Statement, StatementKind, VarDecl,
};
use crate::diagnostics::Diagnostics;
use crate::ir::{Function, Instruction, Opcode, RegId, RegKind};
use crate::token::TokenKind;

use super::regalloc::RegisterPool;

/// Reserved functions the emitter resolves to runtime symbols.
fn builtin_runtime_name(name: &str) -> Option<&'static str> {
    match name {
        "print" => Some("_builtin_print"),
        "len" => Some("_builtin_len"),
        "range" => Some("_builtin_range"),
        "str" => Some("_builtin_str"),
        "int" => Some("_builtin_int"),
        "float" => Some("_builtin_float"),
        _ => None,
    }
}

/// Syntax-directed AST-to-IR lowering. Expression lowering returns the
/// register holding the value; statement lowering appends to the current
/// function's last block. Code emitted outside any function is dropped,
/// which leaves top-level declarations with registers but no code.
pub struct Lowerer<'a> {
    analysis: &'a Analysis,
    functions: Vec<Function>,
    pool: RegisterPool,
    diagnostics: Diagnostics,
    variables: HashMap<String, RegId>,
    class_members: HashMap<String, RegId>,
    current_class: Option<String>,
    current: Option<usize>,
    next_label: u32,
    next_lambda: u32,
    break_labels: Vec<String>,
    continue_labels: Vec<String>,
    pending_edges: Vec<(usize, String)>,
}

impl<'a> Lowerer<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            functions: Vec::new(),
            pool: RegisterPool::new(),
            diagnostics: Diagnostics::new("Code generation"),
            variables: HashMap::new(),
            class_members: HashMap::new(),
            current_class: None,
            current: None,
            next_label: 0,
            next_lambda: 0,
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
            pending_edges: Vec::new(),
        }
    }

    pub fn lower_program(&mut self, program: &Program) {
        for statement in &program.statements {
            self.statement(statement);
        }

        // Synthesize an entry point when the source defines none.
        if !self.functions.iter().any(|f| f.name == "main") {
            self.setup_function("main");
            let reg = self.pool.allocate(RegKind::General);
            self.emit_imm(Opcode::Mov, reg, 0);
            self.emit_op(Opcode::Ret);
            self.finalize_function();
        }
    }

    pub fn into_parts(self) -> (Vec<Function>, RegisterPool, Diagnostics) {
        (self.functions, self.pool, self.diagnostics)
    }

    fn statement(&mut self, statement: &Statement) {
        let line = statement.line;
        match &statement.kind {
            StatementKind::Var(decl) => self.var_decl(decl),
            StatementKind::Const(decl) => self.const_decl(decl),
            StatementKind::Func(decl) => self.func_decl(decl),
            StatementKind::Class(decl) => self.class_decl(decl),
            StatementKind::Signal(_) => self.signal_decl(),
            // Enum values are compile-time constants; no code.
            StatementKind::Enum(_) => {}
            StatementKind::Block { statements } => {
                for child in statements {
                    self.statement(child);
                }
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_stmt(condition, then_branch, else_branch.as_deref()),
            StatementKind::While { condition, body } => self.while_stmt(condition, body),
            StatementKind::For {
                variable,
                iterable,
                body,
            } => self.for_stmt(variable, iterable, body),
            StatementKind::Match { expression, cases } => self.match_stmt(expression, cases),
            StatementKind::Return { value } => self.return_stmt(value.as_ref()),
            StatementKind::Expression { expression } => {
                let reg = self.expression(expression);
                self.pool.free(reg);
            }
            StatementKind::Break => match self.break_labels.last().cloned() {
                Some(label) => self.emit_jump(Opcode::Jmp, &label),
                None => self
                    .diagnostics
                    .error(line, "Break statement outside of loop"),
            },
            StatementKind::Continue => match self.continue_labels.last().cloned() {
                Some(label) => self.emit_jump(Opcode::Jmp, &label),
                None => self
                    .diagnostics
                    .error(line, "Continue statement outside of loop"),
            },
            StatementKind::Pass => self.emit_op(Opcode::Nop),
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        let var_reg = self.pool.allocate(RegKind::General);
        self.pool.set_name(var_reg, &decl.name);
        self.variables.insert(decl.name.clone(), var_reg);

        if let Some(initializer) = &decl.initializer {
            let init_reg = self.expression(initializer);
            self.emit_two(Opcode::Mov, var_reg, init_reg);
            self.pool.free(init_reg);
        } else {
            self.emit_imm(Opcode::Mov, var_reg, 0);
        }
    }

    fn const_decl(&mut self, decl: &ConstDecl) {
        let const_reg = self.pool.allocate(RegKind::General);
        self.pool.set_name(const_reg, &decl.name);
        self.variables.insert(decl.name.clone(), const_reg);

        let value_reg = self.expression(&decl.value);
        self.emit_two(Opcode::Mov, const_reg, value_reg);
        self.pool.free(value_reg);
    }

    fn func_decl(&mut self, decl: &FuncDecl) {
        self.setup_function(&decl.name);
        self.bind_parameters(&decl.parameters);
        self.statement(&decl.body);
        self.ensure_return(!decl.return_type.is_empty() && decl.return_type != "void");
        self.finalize_function();
    }

    fn class_decl(&mut self, decl: &ClassDecl) {
        self.current_class = Some(decl.name.clone());

        // Member variables first, so every method sees them.
        for member in &decl.members {
            if let StatementKind::Var(var) = &member.kind {
                let member_reg = self.pool.allocate(RegKind::General);
                self.pool.set_name(member_reg, &var.name);
                self.class_members.insert(var.name.clone(), member_reg);
            }
        }

        for member in &decl.members {
            if let StatementKind::Func(method) = &member.kind {
                let mangled = format!("{}_{}", decl.name, method.name);
                self.setup_function(&mangled);

                if !method.is_static {
                    let self_reg = self.pool.allocate(RegKind::General);
                    self.pool.set_name(self_reg, "self");
                    self.variables.insert("self".to_string(), self_reg);
                    if let Some(index) = self.current {
                        self.functions[index].parameters.push(self_reg);
                    }
                }
                self.bind_parameters(&method.parameters);

                self.statement(&method.body);
                self.ensure_return(false);
                self.finalize_function();
            }
        }

        self.current_class = None;
    }

    fn signal_decl(&mut self) {
        let name_reg = self.pool.allocate(RegKind::General);
        self.emit_imm(Opcode::Mov, name_reg, 0); // signal name address
        self.emit_call("_register_signal");
        self.pool.free(name_reg);
    }

    fn if_stmt(
        &mut self,
        condition: &Expression,
        then_branch: &Statement,
        else_branch: Option<&Statement>,
    ) {
        let condition_reg = self.expression(condition);
        let else_label = self.label("else");
        let end_label = self.label("endif");

        self.emit_cmp_zero(condition_reg);
        self.emit_jump(Opcode::Je, &else_label);
        self.pool.free(condition_reg);

        self.statement(then_branch);
        self.emit_jump(Opcode::Jmp, &end_label);

        self.place_label(&else_label);
        if let Some(else_branch) = else_branch {
            self.statement(else_branch);
        }
        self.place_label(&end_label);
    }

    fn while_stmt(&mut self, condition: &Expression, body: &Statement) {
        let loop_label = self.label("while_loop");
        let end_label = self.label("while_end");

        self.break_labels.push(end_label.clone());
        self.continue_labels.push(loop_label.clone());

        self.place_label(&loop_label);
        let condition_reg = self.expression(condition);
        self.emit_cmp_zero(condition_reg);
        self.emit_jump(Opcode::Je, &end_label);
        self.pool.free(condition_reg);

        self.statement(body);
        self.emit_jump(Opcode::Jmp, &loop_label);
        self.place_label(&end_label);

        self.break_labels.pop();
        self.continue_labels.pop();
    }

    /// Iteration lowers against the runtime's iterator protocol: validity
    /// check, element fetch, and advance are all external calls.
    fn for_stmt(&mut self, variable: &str, iterable: &Expression, body: &Statement) {
        let iterable_reg = self.expression(iterable);
        let iterator_reg = self.pool.allocate(RegKind::General);
        let loop_var = self.pool.allocate(RegKind::General);
        self.pool.set_name(loop_var, variable);
        self.variables.insert(variable.to_string(), loop_var);

        let loop_label = self.label("for_loop");
        let end_label = self.label("for_end");
        self.break_labels.push(end_label.clone());
        self.continue_labels.push(loop_label.clone());

        self.emit_imm(Opcode::Mov, iterator_reg, 0);
        self.place_label(&loop_label);

        self.emit_call("_iterator_valid");
        let valid_reg = self.pool.allocate(RegKind::General);
        self.emit_cmp_zero(valid_reg);
        self.emit_jump(Opcode::Je, &end_label);
        self.pool.free(valid_reg);

        self.emit_call("_iterator_get");
        let fetched = self.pool.allocate(RegKind::General);
        self.emit_two(Opcode::Mov, loop_var, fetched);
        self.pool.free(fetched);

        self.statement(body);

        self.emit_call("_iterator_next");
        self.emit_jump(Opcode::Jmp, &loop_label);
        self.place_label(&end_label);

        self.pool.free(iterable_reg);
        self.pool.free(iterator_reg);
        self.break_labels.pop();
        self.continue_labels.pop();
    }

    fn match_stmt(&mut self, expression: &Expression, cases: &[MatchCase]) {
        let expr_reg = self.expression(expression);
        let end_label = self.label("match_end");

        let case_labels: Vec<String> = (0..cases.len())
            .map(|i| self.label(&format!("match_case_{i}")))
            .collect();

        // Compare-and-jump chain; no case falls through to another.
        for (case, label) in cases.iter().zip(&case_labels) {
            let pattern_reg = self.expression(&case.pattern);
            self.emit_two(Opcode::Cmp, expr_reg, pattern_reg);
            self.emit_jump(Opcode::Je, label);
            self.pool.free(pattern_reg);
        }
        self.emit_jump(Opcode::Jmp, &end_label);

        for (case, label) in cases.iter().zip(&case_labels) {
            self.place_label(label);
            self.statement(&case.body);
            self.emit_jump(Opcode::Jmp, &end_label);
        }

        self.place_label(&end_label);
        self.pool.free(expr_reg);
    }

    fn return_stmt(&mut self, value: Option<&Expression>) {
        if let Some(value) = value {
            let value_reg = self.expression(value);
            let return_register = self
                .current
                .and_then(|index| self.functions[index].return_register);
            if let Some(return_register) = return_register {
                self.emit_two(Opcode::Mov, return_register, value_reg);
            }
            self.pool.free(value_reg);
        }
        self.emit_op(Opcode::Ret);
    }

    fn expression(&mut self, expression: &Expression) -> RegId {
        let line = expression.line;
        match &expression.kind {
            ExpressionKind::Literal { value, literal } => self.literal(value, *literal),
            ExpressionKind::Identifier { name } => self.identifier(name, line),
            ExpressionKind::Binary { left, op, right } => self.binary(left, *op, right, line),
            ExpressionKind::Unary { op, operand } => self.unary(*op, operand, line),
            ExpressionKind::Ternary {
                condition,
                true_expr,
                false_expr,
            } => self.ternary(condition, true_expr, false_expr),
            ExpressionKind::Call { callee, arguments } => self.call(callee, arguments),
            ExpressionKind::MemberAccess { object, .. } => {
                let object_reg = self.expression(object);
                let result = self.pool.allocate(RegKind::General);
                self.emit_two(Opcode::Load, result, object_reg);
                self.pool.free(object_reg);
                result
            }
            ExpressionKind::ArrayAccess { array, index } => self.array_access(array, index),
            ExpressionKind::ArrayLiteral { elements } => self.array_literal(elements),
            ExpressionKind::DictLiteral { pairs } => self.dict_literal(pairs),
            ExpressionKind::Lambda { parameters, body } => self.lambda(parameters, body),
        }
    }

    fn literal(&mut self, value: &str, literal: TokenKind) -> RegId {
        match literal {
            TokenKind::Integer => {
                let reg = self.pool.allocate(RegKind::General);
                self.emit_imm(Opcode::Mov, reg, value.parse::<i64>().unwrap_or(0));
                reg
            }
            TokenKind::Float => {
                // Fixed-point placeholder encoding: scale by 1000, truncate.
                let reg = self.pool.allocate(RegKind::Float);
                let scaled = (value.parse::<f64>().unwrap_or(0.0) * 1000.0) as i64;
                self.emit_imm(Opcode::Mov, reg, scaled);
                reg
            }
            TokenKind::Boolean => {
                let reg = self.pool.allocate(RegKind::General);
                self.emit_imm(Opcode::Mov, reg, i64::from(value == "true"));
                reg
            }
            // Strings load a string-table address; null and anything else
            // load zero.
            _ => {
                let reg = self.pool.allocate(RegKind::General);
                self.emit_imm(Opcode::Mov, reg, 0);
                reg
            }
        }
    }

    fn identifier(&mut self, name: &str, line: u32) -> RegId {
        let analysis = self.analysis;

        if let Some(&var_reg) = self.variables.get(name) {
            let result = self.pool.allocate(RegKind::General);
            self.emit_two(Opcode::Mov, result, var_reg);
            return result;
        }

        if let Some(&member_reg) = self.class_members.get(name) {
            let result = self.pool.allocate(RegKind::General);
            self.emit_two(Opcode::Mov, result, member_reg);
            return result;
        }

        // Not lowered in this function yet; consult the analyzer's tables.
        if analysis.globals.symbols.contains_key(name) {
            let var_reg = self.pool.allocate(RegKind::General);
            self.pool.set_name(var_reg, name);
            self.variables.insert(name.to_string(), var_reg);

            let result = self.pool.allocate(RegKind::General);
            self.emit_two(Opcode::Mov, result, var_reg);
            return result;
        }

        if analysis.globals.functions.contains_key(name) {
            let result = self.pool.allocate(RegKind::General);
            self.emit_imm(Opcode::Mov, result, 0); // function address
            return result;
        }

        if let Some(class) = self
            .current_class
            .as_ref()
            .and_then(|class_name| analysis.classes.get(class_name))
        {
            if class.members.contains_key(name) {
                let member_reg = self.pool.allocate(RegKind::General);
                self.pool.set_name(member_reg, name);
                self.class_members.insert(name.to_string(), member_reg);

                let result = self.pool.allocate(RegKind::General);
                self.emit_two(Opcode::Mov, result, member_reg);
                return result;
            }
            if class.methods.contains_key(name) {
                let result = self.pool.allocate(RegKind::General);
                self.emit_imm(Opcode::Mov, result, 0); // method address
                return result;
            }
        }

        self.diagnostics
            .error(line, format!("Undefined variable: {name}"));
        self.pool.allocate(RegKind::General)
    }

    fn binary(&mut self, left: &Expression, op: TokenKind, right: &Expression, line: u32) -> RegId {
        let left_reg = self.expression(left);
        let right_reg = self.expression(right);
        let result = self.pool.allocate(RegKind::General);

        match op {
            TokenKind::Plus => self.emit_three(Opcode::Add, result, left_reg, right_reg),
            TokenKind::Minus => self.emit_three(Opcode::Sub, result, left_reg, right_reg),
            TokenKind::Multiply => self.emit_three(Opcode::Mul, result, left_reg, right_reg),
            TokenKind::Divide => self.emit_three(Opcode::Div, result, left_reg, right_reg),
            TokenKind::Modulo => self.emit_three(Opcode::Mod, result, left_reg, right_reg),
            TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => {
                self.emit_two(Opcode::Cmp, left_reg, right_reg);

                let true_label = self.label("cmp_true");
                let end_label = self.label("cmp_end");
                let jump = match op {
                    TokenKind::Equal => Opcode::Je,
                    TokenKind::NotEqual => Opcode::Jne,
                    TokenKind::Less => Opcode::Jl,
                    TokenKind::LessEqual => Opcode::Jle,
                    TokenKind::Greater => Opcode::Jg,
                    _ => Opcode::Jge,
                };
                self.emit_jump(jump, &true_label);
                self.emit_imm(Opcode::Mov, result, 0);
                self.emit_jump(Opcode::Jmp, &end_label);
                self.place_label(&true_label);
                self.emit_imm(Opcode::Mov, result, 1);
                self.place_label(&end_label);
            }
            TokenKind::And | TokenKind::LogicalAnd => {
                self.emit_three(Opcode::And, result, left_reg, right_reg)
            }
            TokenKind::Or | TokenKind::LogicalOr => {
                self.emit_three(Opcode::Or, result, left_reg, right_reg)
            }
            TokenKind::Assign | TokenKind::InferAssign => {
                self.emit_two(Opcode::Mov, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            TokenKind::PlusAssign => {
                self.emit_three(Opcode::Add, left_reg, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            TokenKind::MinusAssign => {
                self.emit_three(Opcode::Sub, left_reg, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            TokenKind::MultiplyAssign => {
                self.emit_three(Opcode::Mul, left_reg, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            TokenKind::DivideAssign => {
                self.emit_three(Opcode::Div, left_reg, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            TokenKind::ModuloAssign => {
                self.emit_three(Opcode::Mod, left_reg, left_reg, right_reg);
                self.emit_two(Opcode::Mov, result, left_reg);
            }
            _ => {
                self.diagnostics.error(line, "Unknown binary operator");
                self.emit_imm(Opcode::Mov, result, 0);
            }
        }

        self.pool.free(left_reg);
        self.pool.free(right_reg);
        result
    }

    fn unary(&mut self, op: TokenKind, operand: &Expression, line: u32) -> RegId {
        let operand_reg = self.expression(operand);
        let result = self.pool.allocate(RegKind::General);

        match op {
            TokenKind::Minus => {
                let zero = self.pool.allocate(RegKind::General);
                self.emit_imm(Opcode::Mov, zero, 0);
                self.emit_three(Opcode::Sub, result, zero, operand_reg);
                self.pool.free(zero);
            }
            TokenKind::Plus => self.emit_two(Opcode::Mov, result, operand_reg),
            TokenKind::Not | TokenKind::LogicalNot => {
                self.emit_two(Opcode::Not, result, operand_reg)
            }
            _ => {
                self.diagnostics.error(line, "Unknown unary operator");
                self.emit_two(Opcode::Mov, result, operand_reg);
            }
        }

        self.pool.free(operand_reg);
        result
    }

    fn ternary(
        &mut self,
        condition: &Expression,
        true_expr: &Expression,
        false_expr: &Expression,
    ) -> RegId {
        let condition_reg = self.expression(condition);
        let false_label = self.label("ternary_false");
        let end_label = self.label("ternary_end");

        self.emit_cmp_zero(condition_reg);
        self.emit_jump(Opcode::Je, &false_label);
        self.pool.free(condition_reg);

        let true_reg = self.expression(true_expr);
        let result = self.pool.allocate(RegKind::General);
        self.emit_two(Opcode::Mov, result, true_reg);
        self.pool.free(true_reg);
        self.emit_jump(Opcode::Jmp, &end_label);

        self.place_label(&false_label);
        let false_reg = self.expression(false_expr);
        self.emit_two(Opcode::Mov, result, false_reg);
        self.pool.free(false_reg);

        self.place_label(&end_label);
        result
    }

    /// Stack convention: arguments push in reverse order, the callee's name
    /// (or the register holding an indirect target) is called, and the stack
    /// rebalances with one pop per argument.
    fn call(&mut self, callee: &Expression, arguments: &[Expression]) -> RegId {
        let mut arg_regs = Vec::new();
        for argument in arguments {
            arg_regs.push(self.expression(argument));
        }

        if let ExpressionKind::Identifier { name } = &callee.kind {
            if let Some(runtime) = builtin_runtime_name(name) {
                let result = self.runtime_call(runtime, &arg_regs);
                for reg in arg_regs {
                    self.pool.free(reg);
                }
                return result;
            }
        }

        for reg in arg_regs.iter().rev() {
            self.emit_one(Opcode::Push, *reg);
        }

        if let ExpressionKind::Identifier { name } = &callee.kind {
            self.emit_call(name);
        } else {
            let callee_reg = self.expression(callee);
            let target = self.pool.name(callee_reg).to_string();
            self.emit_call(&target);
            self.pool.free(callee_reg);
        }

        self.pop_arguments(arg_regs.len());

        let result = self.pool.allocate(RegKind::General);
        for reg in arg_regs {
            self.pool.free(reg);
        }
        result
    }

    fn runtime_call(&mut self, runtime: &str, args: &[RegId]) -> RegId {
        let result = self.pool.allocate(RegKind::General);
        for reg in args.iter().rev() {
            self.emit_one(Opcode::Push, *reg);
        }
        self.emit_call(runtime);
        self.pop_arguments(args.len());
        result
    }

    fn pop_arguments(&mut self, count: usize) {
        for _ in 0..count {
            let scratch = self.pool.allocate(RegKind::General);
            self.emit_one(Opcode::Pop, scratch);
            self.pool.free(scratch);
        }
    }

    fn array_access(&mut self, array: &Expression, index: &Expression) -> RegId {
        let array_reg = self.expression(array);
        let index_reg = self.expression(index);
        let result = self.pool.allocate(RegKind::General);

        self.emit_one(Opcode::Push, array_reg);
        self.emit_one(Opcode::Push, index_reg);
        self.emit_call("_array_get");
        self.pop_arguments(2);

        self.pool.free(array_reg);
        self.pool.free(index_reg);
        result
    }

    fn array_literal(&mut self, elements: &[Expression]) -> RegId {
        let result = self.pool.allocate(RegKind::General);
        self.emit_call("_array_create");

        for element in elements {
            let element_reg = self.expression(element);
            self.emit_one(Opcode::Push, result);
            self.emit_one(Opcode::Push, element_reg);
            self.emit_call("_array_append");
            self.pop_arguments(2);
            self.pool.free(element_reg);
        }

        result
    }

    fn dict_literal(&mut self, pairs: &[(Expression, Expression)]) -> RegId {
        let result = self.pool.allocate(RegKind::General);
        self.emit_call("_dict_create");

        for (key, value) in pairs {
            let key_reg = self.expression(key);
            let value_reg = self.expression(value);

            self.emit_one(Opcode::Push, result);
            self.emit_one(Opcode::Push, key_reg);
            self.emit_one(Opcode::Push, value_reg);
            self.emit_call("_dict_set");
            self.pop_arguments(3);

            self.pool.free(key_reg);
            self.pool.free(value_reg);
        }

        result
    }

    /// Lambdas lower into detached functions; the surrounding expression
    /// receives a placeholder value until function pointers are linked.
    fn lambda(&mut self, parameters: &[Parameter], body: &Expression) -> RegId {
        let lambda_name = format!("_lambda_{}", self.next_lambda);
        self.next_lambda += 1;

        let saved_current = self.current;
        let saved_variables = std::mem::take(&mut self.variables);
        let saved_edges = std::mem::take(&mut self.pending_edges);
        let saved_label = self.next_label;

        self.setup_function(&lambda_name);
        for param in parameters {
            let param_reg = self.pool.allocate(RegKind::General);
            self.pool.set_name(param_reg, &param.name);
            self.variables.insert(param.name.clone(), param_reg);
        }

        let body_reg = self.expression(body);
        let out = self.pool.allocate(RegKind::General);
        self.emit_two(Opcode::Mov, out, body_reg);
        self.emit_op(Opcode::Ret);
        self.pool.free(body_reg);
        self.finalize_function();

        self.current = saved_current;
        self.variables = saved_variables;
        self.pending_edges = saved_edges;
        self.next_label = saved_label;

        let result = self.pool.allocate(RegKind::General);
        self.emit_imm(Opcode::Mov, result, 0);
        result
    }

    fn bind_parameters(&mut self, parameters: &[Parameter]) {
        for param in parameters {
            let param_reg = self.pool.allocate(RegKind::General);
            self.pool.set_name(param_reg, &param.name);
            self.variables.insert(param.name.clone(), param_reg);
            if let Some(index) = self.current {
                self.functions[index].parameters.push(param_reg);
            }
        }
    }

    fn setup_function(&mut self, name: &str) {
        let mut function = Function::new(name);
        self.next_label = 0;

        self.variables.clear();
        if self.current_class.is_some() {
            for (member, reg) in &self.class_members {
                self.variables.insert(member.clone(), *reg);
            }
        }

        function.return_register = Some(self.pool.allocate(RegKind::General));
        self.functions.push(function);
        self.current = Some(self.functions.len() - 1);
    }

    /// Appends a trailing `ret` when the body did not end in one; functions
    /// with a declared non-void return type return a default zero.
    fn ensure_return(&mut self, needs_value: bool) {
        let Some(index) = self.current else { return };
        let ends_in_ret = self.functions[index]
            .last_instruction()
            .is_some_and(|i| i.opcode == Opcode::Ret);
        if ends_in_ret {
            return;
        }

        if needs_value {
            let reg = self.pool.allocate(RegKind::General);
            self.emit_imm(Opcode::Mov, reg, 0);
            self.pool.free(reg);
        }
        self.emit_op(Opcode::Ret);
    }

    /// Resolves this function's recorded branch targets into block edges.
    fn finalize_function(&mut self) {
        if let Some(index) = self.current {
            let function = &mut self.functions[index];
            for (from, label) in self.pending_edges.drain(..) {
                if let Some(to) = function.block_index(&label) {
                    function.add_edge(from, to);
                }
            }
        }
        self.current = None;
    }

    fn label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}_{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Starts a new basic block at `label`, recording the fall-through edge
    /// from the previous block when control can reach it.
    fn place_label(&mut self, label: &str) {
        let Some(index) = self.current else { return };
        let function = &mut self.functions[index];
        let previous = function.blocks.len() - 1;
        let falls_through = !function.blocks[previous].ends_in_transfer();
        let block = function.create_block(label);
        if falls_through {
            function.add_edge(previous, block);
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        let Some(index) = self.current else { return };
        if let Some(block) = self.functions[index].blocks.last_mut() {
            block.instructions.push(instruction);
        }
    }

    fn emit_op(&mut self, opcode: Opcode) {
        self.emit(Instruction::new(opcode));
    }

    fn emit_one(&mut self, opcode: Opcode, a: RegId) {
        let mut instruction = Instruction::new(opcode);
        instruction.operands.push(a);
        self.emit(instruction);
    }

    fn emit_two(&mut self, opcode: Opcode, a: RegId, b: RegId) {
        let mut instruction = Instruction::new(opcode);
        instruction.operands = vec![a, b];
        self.emit(instruction);
    }

    fn emit_three(&mut self, opcode: Opcode, a: RegId, b: RegId, c: RegId) {
        let mut instruction = Instruction::new(opcode);
        instruction.operands = vec![a, b, c];
        self.emit(instruction);
    }

    fn emit_imm(&mut self, opcode: Opcode, dest: RegId, immediate: i64) {
        let mut instruction = Instruction::new(opcode);
        instruction.operands.push(dest);
        instruction.immediate = Some(immediate);
        self.emit(instruction);
    }

    fn emit_cmp_zero(&mut self, reg: RegId) {
        let mut instruction = Instruction::new(Opcode::Cmp);
        instruction.operands.push(reg);
        instruction.immediate = Some(0);
        self.emit(instruction);
    }

    fn emit_jump(&mut self, opcode: Opcode, label: &str) {
        if opcode.is_branch() {
            if let Some(index) = self.current {
                let block = self.functions[index].blocks.len() - 1;
                self.pending_edges.push((block, label.to_string()));
            }
        }
        self.emit(Instruction::with_label(opcode, label));
    }

    fn emit_call(&mut self, target: &str) {
        self.emit(Instruction::with_label(Opcode::Call, target));
    }
}
