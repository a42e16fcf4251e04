use crate::compiler::js_string;
use crate::types::{CompileOptions, ModuleFormat};

const PROLOGUE: &str = r#"(function (exports) {
  function getResponse(context, visited) {
    var i, response, base;
    for (i = 0; i < this.responses.length; i++) {
      response = this.responses[i];
      if (response.check === undefined || response.check()) {
        return response;
      }
    }

    if (this.base !== undefined && dialogs[this.base] !== undefined) {
      visited = visited || [this.name];
      if (visited.indexOf(this.base) === -1) {
        visited.push(this.base);
        base = new dialogs[this.base](context);
        return getResponse.call(base, context, visited);
      }
    }

    return false;
  }

  function chooseOption(context, optionText) {
    var i, j, event, option;
    for (i = 0; i < this.options.length; i++) {
      option = this.options[i];
      if (option.text === optionText) {
        for (j = 0; j < option.events.length; j++) {
          event = option.events[j];
          if (context[event[0]] !== undefined) {
            context[event[0]].trigger(event[1], context.self);
          }
        }

        return option;
      }
    }

    return false;
  }

  function getOptions() {
    var options = [];
    var i;
    for (i = 0; i < this.options.length; i++) {
      options.push(this.options[i].text);
    }

    return options;
  }

"#;

/// Wraps a lowered dialog body in the runtime support code.
pub fn emit(body: &str, options: &CompileOptions) -> String {
    let target = match options.module_format {
        ModuleFormat::CommonJs => "exports",
        ModuleFormat::Global => "globalThis",
    };

    let mut out = String::with_capacity(PROLOGUE.len() + body.len() + 96);
    out.push_str(PROLOGUE);
    out.push_str("  var dialogs = exports[");
    out.push_str(&js_string(&options.registry));
    out.push_str("] = {};\n");
    out.push_str(body);
    out.push_str("})(");
    out.push_str(target);
    out.push_str(");\n");
    out
}
