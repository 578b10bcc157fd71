use super::TransformRequest;

pub const SYSTEM_PROMPT: &str = "You are a coding assistant that rewrites Python functions \
so they can be called programmatically, and you answer with a single JSON object only.";

const RULES: &str = r#"Rules:
1. Every interactive input (input(), int(input()), float(input()), ...) becomes an explicit parameter of the function.
2. Every call to one of the helper functions above that supplies external data becomes an explicit parameter.
3. Replace every print(...) with a return of the same formatted text.
4. Infer each parameter's python_type: float(...) -> "float", int(...) -> "int", otherwise "str".
   Its type is "number" for int and float, "text" for str.
5. Use the original prompt text as the description when there is one; otherwise write a short one.

Respond with a JSON object with these fields:
- "full_code": the complete rewritten code, including any imports it needs
- "function_name": the name of the function to call
- "inputs": [{"name": "...", "type": "text|number|image", "description": "...", "python_type": "str|int|float|bool"}]"#;

/// User payload: context, target function and the task rules.
pub fn build_user_prompt(request: &TransformRequest) -> String {
    let mut prompt = String::new();
    if !request.context.trim().is_empty() {
        prompt.push_str("Other code in the same file:\n```python\n");
        prompt.push_str(request.context.trim_end());
        prompt.push_str("\n```\n\n");
    }
    prompt.push_str(&format!(
        "Rewrite the function `{}`:\n```python\n{}\n```\n\n",
        request.function_name,
        request.function_source.trim_end()
    ));
    prompt.push_str(RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_context_and_function() {
        let prompt = build_user_prompt(&TransformRequest {
            function_name: "total".to_string(),
            function_source: "def total():\n    print(input())\n".to_string(),
            context: "import math".to_string(),
        });
        assert!(prompt.starts_with("Other code in the same file:\n```python\nimport math\n```"));
        assert!(prompt.contains("Rewrite the function `total`"));
        assert!(prompt.contains("def total():\n    print(input())\n```"));
        assert!(prompt.contains("\"full_code\""));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_user_prompt(&TransformRequest {
            function_name: "f".to_string(),
            function_source: "def f(): pass".to_string(),
            context: "  ".to_string(),
        });
        assert!(prompt.starts_with("Rewrite the function `f`"));
    }
}
