#![no_main]

use libfuzzer_sys::fuzz_target;

mod forms;

use forms::JaspForm;

fuzz_target!(|forms: Vec<JaspForm>| {
    let mut context = jasp::EvaluationContext::capturing();

    for form in forms {
        let _ = context.evaluate_str(&form.to_string());
    }
    let _ = context.take_output();
});
